//! acuadvisor-retriever: passage retrieval over a pre-built clinical index
//!
//! Loads an index of guideline passages and their embeddings from disk and
//! answers top-K similarity queries against it. Building the index is done
//! elsewhere; this crate only reads it.
//!
//! ## Key Modules
//!
//! - **[`storage`]**: on-disk index format and the read-only [`storage::IndexSource`] trait
//! - **[`index`]**: the in-memory [`VectorIndex`] and similarity ranking
//! - **[`retriever`]**: [`Retriever`], which embeds query text and searches the index
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use acuadvisor_embed::{EmbedConfig, FastEmbedProvider};
//! use acuadvisor_retriever::{Retriever, VectorIndex, DEFAULT_TOP_K};
//! use std::{path::Path, sync::Arc};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = Arc::new(FastEmbedProvider::create(EmbedConfig::default()).await?);
//! let index = Arc::new(VectorIndex::load_for(Path::new("clinical_index.db"), provider.as_ref()).await?);
//! let retriever = Retriever::new(provider, index)?;
//!
//! for hit in retriever.retrieve("treatment for chronic headache", DEFAULT_TOP_K).await? {
//!     println!("{:.3} {}", hit.score, hit.chunk.text);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Model coupling
//!
//! Stored vectors are only comparable with query vectors from the same
//! embedding model. Each index records the model identifier and dimension it
//! was built with, and loading checks both against the provider.
//!
//! ## Architecture
//!
//! ```text
//! query text → EmbeddingProvider → VectorIndex::query → RetrievalResult
//!                                       ↑
//!                         SqliteIndexStore (index file)
//! ```

pub mod error;
pub mod index;
pub mod retriever;
pub mod storage;

pub use error::{IndexLoadError, RetrievalError};
pub use index::{IndexStats, RetrievalResult, ScoredChunk, VectorIndex};
pub use retriever::{DEFAULT_TOP_K, Retriever};
pub use storage::{DistanceMetric, DocumentChunk, IndexManifest};
