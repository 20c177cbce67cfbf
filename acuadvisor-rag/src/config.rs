//! Advisor configuration
//!
//! Loaded from an optional TOML file. Every field has a default, so an empty
//! file (or no file at all) gives a working configuration:
//!
//! ```toml
//! [embedding]
//! model_name = "sentence-transformers/all-MiniLM-L6-v2"
//!
//! [index]
//! path = "clinical_index.db"
//!
//! [retrieval]
//! top_k = 5
//!
//! [llm]
//! base_url = "https://api.groq.com/openai/v1"
//! model = "llama3-70b-8192"
//! temperature = 0.3
//! timeout_secs = 60
//! api_key_env = "GROQ_API_KEY"
//! ```
//!
//! The credential itself never appears in the file; only the name of the
//! environment variable holding it.

use crate::error::{RagError, Result};
use acuadvisor_embed::EmbedConfig;
use acuadvisor_retriever::DEFAULT_TOP_K;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File read when no `--config` is given, if it exists
pub const DEFAULT_CONFIG_FILE: &str = "acuadvisor.toml";
pub const DEFAULT_INDEX_PATH: &str = "clinical_index.db";
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama3-70b-8192";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_API_KEY_ENV: &str = "GROQ_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub path: PathBuf,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_INDEX_PATH),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Passages retrieved per query
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// Completion service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// OpenAI-compatible API root; `/chat/completions` is appended
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

impl LlmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub embedding: EmbedConfig,
    pub index: IndexSettings,
    pub retrieval: RetrievalSettings,
    pub llm: LlmSettings,
}

impl AdvisorConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RagError::config(format!("invalid TOML: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RagError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load `explicit` if given, otherwise [`DEFAULT_CONFIG_FILE`] if it
    /// exists in the working directory, otherwise the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                Self::from_file(path)?
            }
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                tracing::info!("Loading configuration from {DEFAULT_CONFIG_FILE}");
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                tracing::debug!("No configuration file, using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Check field ranges without touching the network or filesystem
    pub fn validate(&self) -> Result<()> {
        self.embedding
            .validate()
            .map_err(|e| RagError::config(format!("[embedding] {e}")))?;

        if self.retrieval.top_k == 0 {
            return Err(RagError::config("[retrieval] top_k must be at least 1"));
        }
        if self.llm.base_url.trim().is_empty() {
            return Err(RagError::config("[llm] base_url must not be empty"));
        }
        if self.llm.model.trim().is_empty() {
            return Err(RagError::config("[llm] model must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(RagError::config(format!(
                "[llm] temperature {} is outside 0.0..=2.0",
                self.llm.temperature
            )));
        }
        if self.llm.timeout_secs == 0 {
            return Err(RagError::config("[llm] timeout_secs must be at least 1"));
        }
        Ok(())
    }

    /// Read the completion service credential from the environment
    pub fn api_key(&self) -> Result<ApiKey> {
        ApiKey::from_env(&self.llm.api_key_env)
    }
}

/// Completion service credential. Never printed.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Read a key from `var`; unset or blank is [`RagError::MissingCredential`]
    pub fn from_env(var: &str) -> Result<Self> {
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => Ok(Self(value.trim().to_string())),
            _ => Err(RagError::MissingCredential {
                var: var.to_string(),
            }),
        }
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}
