//! Error types for the answering pipeline

use acuadvisor_embed::EmbedError;
use acuadvisor_retriever::{IndexLoadError, RetrievalError};
use std::time::Duration;

pub type Result<T> = std::result::Result<T, RagError>;

/// Failure of a single call to the completion service.
///
/// Every variant is scoped to one query; none of them poison the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("Completion request timed out after {}s", .timeout.as_secs())]
    Timeout { timeout: Duration },

    #[error("Completion request failed: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },

    /// The service rejected the credential (401/403)
    #[error("Completion service rejected the credential (HTTP {status})")]
    Authentication { status: u16 },

    #[error("Completion service returned HTTP {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Malformed completion response: {message}")]
    MalformedResponse { message: String },

    #[error("Completion response contained no choices")]
    EmptyResponse,
}

impl CompletionError {
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }
}

/// Top level error for building and running the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// The completion service credential is not configured
    #[error("Missing credential: set the {var} environment variable")]
    MissingCredential { var: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The embedding model could not be fetched or loaded
    #[error("Failed to load embedding model: {0}")]
    ResourceLoad(#[from] EmbedError),

    #[error("Failed to load index: {0}")]
    IndexLoad(#[from] IndexLoadError),

    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Clinical analysis failed: {0}")]
    Completion(#[from] CompletionError),
}

impl RagError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the pipeline can no longer serve queries after this error.
    ///
    /// Fatal errors come from resource construction. Retrieval and completion
    /// failures only affect the query that raised them.
    pub fn is_fatal(&self) -> bool {
        match self {
            RagError::MissingCredential { .. }
            | RagError::Config { .. }
            | RagError::ResourceLoad(_)
            | RagError::IndexLoad(_) => true,
            RagError::Retrieval(_) | RagError::Completion(_) => false,
        }
    }
}
