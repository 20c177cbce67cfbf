//! # acuadvisor-embed
//!
//! Sentence embeddings for the acupuncture clinical advisor, computed locally
//! with ONNX models via FastEmbed.
//!
//! ## Quick Start
//!
//! ```no_run
//! use acuadvisor_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! // all-MiniLM-L6-v2, downloaded on first use
//! let provider = FastEmbedProvider::create(EmbedConfig::default()).await?;
//!
//! let vector = provider.embed_text("treatment for chronic headache").await?;
//! assert_eq!(vector.len(), provider.embedding_dimension());
//! # Ok(())
//! # }
//! ```
//!
//! ## Caching
//!
//! Loading model weights is expensive, so loaded models are cached for the
//! lifetime of the process, keyed by configuration. Construction is
//! single-flight: concurrent first loads of the same configuration share one
//! load. A load that fails is not cached.
//!
//! ## Determinism
//!
//! Vectors are L2-normalised and stored as `f16`. For a fixed model the same
//! text always yields the same vector.
//!
//! ## Architecture
//!
//! - [`config`]: model selection and provider settings
//! - [`provider`]: the [`EmbeddingProvider`] trait and the FastEmbed implementation
//! - [`error`]: error types and result handling

pub mod config;
pub mod error;
pub mod provider;

// Re-export main types for easy access
pub use config::{DEFAULT_MODEL, EmbedConfig, EmbedConfigBuilder, SupportedModel};
pub use error::{EmbedError, Result};
pub use provider::{EmbeddingProvider, EmbeddingResult, FastEmbedProvider};
