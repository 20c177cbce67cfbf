//! # acuadvisor-rag
//!
//! Answers clinical acupuncture questions by retrieving guideline passages
//! from a pre-built index and asking a language model for a structured
//! answer grounded in them.
//!
//! ## Components
//!
//! - [`prompt`]: the fixed instruction template and [`PromptAssembler`]
//! - [`llm`]: the [`CompletionClient`] trait and the OpenAI-compatible [`GroqClient`]
//! - [`pipeline`]: [`RagPipeline`], retrieval → prompt → completion for one [`Query`]
//! - [`resources`]: process-wide, build-once [`ResourceRegistry`]
//! - [`orchestrator`]: per-session [`Orchestrator`] with last-query reuse
//! - [`config`]: [`AdvisorConfig`], loaded from `acuadvisor.toml`
//!
//! ## Usage
//!
//! ```no_run
//! use acuadvisor_rag::{AdvisorConfig, Orchestrator, ResourceRegistry, SubmitOutcome};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = AdvisorConfig::load(None)?;
//! // Fails fast if GROQ_API_KEY is unset
//! let pipeline = ResourceRegistry::global().pipeline(&config).await?;
//! let orchestrator = Orchestrator::new(pipeline);
//!
//! match orchestrator.submit("Treatment protocol for chronic headache").await? {
//!     SubmitOutcome::Answered(answer) | SubmitOutcome::Reused(answer) => println!("{}", answer.text),
//!     SubmitOutcome::Failed(message) => eprintln!("Clinical analysis failed: {message}"),
//!     SubmitOutcome::Busy | SubmitOutcome::Ignored => {}
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! Loading the model or index, a missing credential and bad configuration
//! are fatal ([`RagError::is_fatal`]). Retrieval and completion failures only
//! fail the query that hit them.

pub mod config;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod pipeline;
pub mod prompt;
pub mod resources;

pub use config::{AdvisorConfig, ApiKey};
pub use error::{CompletionError, RagError, Result};
pub use llm::{CompletionClient, GroqClient};
pub use orchestrator::{Orchestrator, QueryState, SubmitOutcome};
pub use pipeline::{Answer, AnswerPipeline, Query, RagPipeline};
pub use prompt::{PromptAssembler, RenderedPrompt};
pub use resources::{ResourceCell, ResourceRegistry, ResourceStatus};
