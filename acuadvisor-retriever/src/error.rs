//! Error types for index loading and retrieval

use acuadvisor_embed::EmbedError;
use std::path::PathBuf;

/// Failure to load a vector index. Always fatal to the pipeline that needs it.
#[derive(Debug, thiserror::Error)]
pub enum IndexLoadError {
    /// Nothing exists at the configured index path
    #[error("Index not found at {path}")]
    NotFound { path: PathBuf },

    /// The file exists but could not be read as an index
    #[error("Index storage error: {source}")]
    Storage {
        #[from]
        source: sqlx::Error,
    },

    /// A required manifest entry is absent
    #[error("Index manifest is missing '{key}'")]
    MissingManifestKey { key: String },

    /// A manifest entry could not be parsed
    #[error("Index manifest has invalid '{key}': {value}")]
    InvalidManifest { key: String, value: String },

    /// A stored chunk is malformed
    #[error("Chunk {id} is corrupt: {reason}")]
    CorruptChunk { id: i64, reason: String },

    /// Vectors in the index don't have the dimension the index or provider expects
    #[error("Embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// The index was built with a different embedding model than the one loaded
    #[error("Index was built with '{index_model}' but the provider uses '{provider_model}'")]
    ModelMismatch {
        index_model: String,
        provider_model: String,
    },
}

/// Failure while answering a single retrieval request
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// The query text could not be embedded
    #[error("Failed to embed query: {0}")]
    Embedding(#[from] EmbedError),

    /// The query vector doesn't match the index dimension
    #[error("Query vector has dimension {found}, index expects {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}
