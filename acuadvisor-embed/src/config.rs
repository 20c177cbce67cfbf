//! Configuration for embedding models

use crate::error::{EmbedError, Result};
use derive_builder::Builder;
use fastembed::EmbeddingModel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Identifier of the default sentence-embedding model.
pub const DEFAULT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Sentence-embedding models this crate knows how to load.
///
/// Each variant maps a public model identifier (as used on HuggingFace and
/// recorded in index manifests) onto the corresponding fastembed model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedModel {
    AllMiniLmL6V2,
    AllMiniLmL12V2,
    BgeSmallEnV15,
    BgeBaseEnV15,
}

impl SupportedModel {
    /// All supported models, default first
    pub const ALL: [SupportedModel; 4] = [
        SupportedModel::AllMiniLmL6V2,
        SupportedModel::AllMiniLmL12V2,
        SupportedModel::BgeSmallEnV15,
        SupportedModel::BgeBaseEnV15,
    ];

    /// Resolve a model identifier. Matching ignores ASCII case.
    pub fn from_id(id: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|model| model.id().eq_ignore_ascii_case(id.trim()))
            .ok_or_else(|| EmbedError::UnsupportedModel {
                model: id.to_string(),
            })
    }

    /// Public identifier of the model
    pub fn id(&self) -> &'static str {
        match self {
            SupportedModel::AllMiniLmL6V2 => DEFAULT_MODEL,
            SupportedModel::AllMiniLmL12V2 => "sentence-transformers/all-MiniLM-L12-v2",
            SupportedModel::BgeSmallEnV15 => "BAAI/bge-small-en-v1.5",
            SupportedModel::BgeBaseEnV15 => "BAAI/bge-base-en-v1.5",
        }
    }

    /// Dimension of the vectors the model produces
    pub fn dimension(&self) -> usize {
        match self {
            SupportedModel::AllMiniLmL6V2
            | SupportedModel::AllMiniLmL12V2
            | SupportedModel::BgeSmallEnV15 => 384,
            SupportedModel::BgeBaseEnV15 => 768,
        }
    }

    pub(crate) fn to_fastembed(self) -> EmbeddingModel {
        match self {
            SupportedModel::AllMiniLmL6V2 => EmbeddingModel::AllMiniLML6V2,
            SupportedModel::AllMiniLmL12V2 => EmbeddingModel::AllMiniLML12V2,
            SupportedModel::BgeSmallEnV15 => EmbeddingModel::BGESmallENV15,
            SupportedModel::BgeBaseEnV15 => EmbeddingModel::BGEBaseENV15,
        }
    }
}

impl std::fmt::Display for SupportedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Configuration for embedding models
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
#[serde(default)]
pub struct EmbedConfig {
    /// Identifier of the embedding model to use
    #[builder(default = "DEFAULT_MODEL.to_string()")]
    pub model_name: String,
    /// Directory where downloaded model weights are cached. `None` uses the
    /// fastembed default.
    #[builder(default)]
    pub cache_dir: Option<PathBuf>,
    /// Maximum batch size for embedding generation
    #[builder(default = "32")]
    pub batch_size: usize,
    /// Whether to print download progress on first load
    #[builder(default = "false")]
    pub show_download_progress: bool,
}

impl EmbedConfig {
    /// Create a new embedding configuration using the builder
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder::default()
    }

    /// Create a configuration for the given model with default settings
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Set the model cache directory (builder style)
    pub fn with_cache_dir<P: AsRef<Path>>(self, cache_dir: P) -> Self {
        Self {
            cache_dir: Some(cache_dir.as_ref().to_path_buf()),
            ..self
        }
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Get the model identifier
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Resolve the configured model
    pub fn model(&self) -> Result<SupportedModel> {
        SupportedModel::from_id(&self.model_name)
    }

    /// Validate the configuration without loading anything
    pub fn validate(&self) -> Result<()> {
        self.model()?;
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch_size must be at least 1"));
        }
        if let Some(dir) = &self.cache_dir {
            if dir.exists() && !dir.is_dir() {
                tracing::error!("Model cache path is not a directory: {}", dir.display());
                return Err(EmbedError::invalid_config(format!(
                    "cache_dir {} is not a directory",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            cache_dir: None,
            batch_size: 32,
            show_download_progress: false,
        }
    }
}
