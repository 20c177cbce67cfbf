//! Error types for the embedding system

/// Result type for embedding operations.
///
/// This is a convenience type alias that uses [`EmbedError`] as the error type.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// Covers configuration problems, model loading failures and runtime failures
/// during embedding generation. Loading failures are what callers higher up
/// the stack treat as a fatal resource error; generation failures are scoped
/// to the text being embedded.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// The configured model identifier is not one this crate can load
    #[error("Unsupported embedding model: {model}")]
    UnsupportedModel { model: String },

    /// Error when model configuration is invalid
    #[error("Invalid model configuration: {message}")]
    InvalidConfig { message: String },

    /// Error during model initialization
    #[error("Model initialization failed: {source}")]
    ModelInitialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error during embedding generation
    #[error("Embedding generation failed: {source}")]
    EmbeddingGeneration {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A thread panicked while holding the model lock
    #[error("Embedding model lock poisoned")]
    LockPoisoned,

    /// IO errors when reading or caching model files
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Async task join errors
    #[error("Async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },

    /// Generic errors from other libraries
    #[error("External error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl EmbedError {
    /// Create a model initialization error from any error type.
    ///
    /// Convenience constructor for wrapping errors that occur during model
    /// loading into the appropriate variant.
    pub fn model_init<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::ModelInitialization {
            source: source.into(),
        }
    }

    /// Create an embedding generation error from any error type.
    pub fn embedding_gen<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::EmbeddingGeneration {
            source: source.into(),
        }
    }

    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns `true` if this error happened while loading the model rather
    /// than while embedding a particular text.
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedModel { .. }
                | Self::InvalidConfig { .. }
                | Self::ModelInitialization { .. }
                | Self::Io { .. }
        )
    }
}
