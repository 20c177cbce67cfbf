//! Embedding provider implementations

use crate::config::{EmbedConfig, SupportedModel};
use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use fastembed::{InitOptions, TextEmbedding};
use fnv::FnvHasher;
use half::f16;
use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::OnceCell;

/// Result of embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Vec<f16>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result from a vector of f16 embeddings.
    ///
    /// The dimension is inferred from the first embedding vector and defaults
    /// to 0 when there are none.
    pub fn new(embeddings: Vec<Vec<f16>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Type alias for cached model entries (model, dimension)
type ModelCacheEntry = (Arc<Mutex<TextEmbedding>>, usize);

/// Per-configuration slot. The outer map lock is only held long enough to
/// fetch the slot; the load itself runs under the slot's own single-flight
/// initialisation, so concurrent first loads of one configuration produce
/// exactly one model and loads of different configurations don't block
/// each other.
type ModelSlot = Arc<OnceCell<ModelCacheEntry>>;

/// Global cache for initialized embedding models to avoid reloading
static MODEL_CACHE: OnceLock<Mutex<HashMap<String, ModelSlot>>> = OnceLock::new();

/// Get the global model cache
fn get_model_cache() -> &'static Mutex<HashMap<String, ModelSlot>> {
    MODEL_CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Trait for embedding providers that can generate embeddings from text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>>;

    /// Generate embeddings for multiple texts (batch processing)
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Get the dimension of embeddings produced by this provider
    fn embedding_dimension(&self) -> usize;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;

    /// Identifier of the model weights behind this provider. Indices record
    /// it so a mismatched model can be detected at load time.
    fn model_id(&self) -> &str;
}

/// FastEmbed-based embedding provider using local ONNX models
#[derive(Clone)]
pub struct FastEmbedProvider {
    config: EmbedConfig,
    model: Option<Arc<Mutex<TextEmbedding>>>,
    dimension: usize,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("config", &self.config)
            .field("model", &self.model.is_some())
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedProvider {
    /// Creates a new uninitialized provider. Call [`initialize`](Self::initialize)
    /// before embedding, or use [`create`](Self::create).
    pub fn new(config: EmbedConfig) -> Self {
        let dimension = config
            .model()
            .map(|model| model.dimension())
            .unwrap_or(384);
        Self {
            config,
            model: None,
            dimension,
        }
    }

    /// Loads the embedding model, reusing a cached instance when one exists
    /// for the same configuration.
    ///
    /// A failed load leaves nothing behind in the cache, so calling this
    /// again retries from scratch.
    pub async fn initialize(&mut self) -> Result<()> {
        self.config.validate()?;
        let model = self.config.model()?;

        tracing::info!("Initializing FastEmbed provider for model: {}", model);

        let cache_key = self.create_cache_key();
        let slot = {
            let mut cache = get_model_cache()
                .lock()
                .map_err(|_| EmbedError::LockPoisoned)?;
            Arc::clone(cache.entry(cache_key).or_default())
        };

        if slot.initialized() {
            tracing::info!("Using cached model for: {}", model);
        }

        let config = self.config.clone();
        let (model_arc, dimension) = slot
            .get_or_try_init(|| Self::load_model(config, model))
            .await?
            .clone();

        self.model = Some(model_arc);
        self.dimension = dimension;

        self.validate_model().await
    }

    /// Creates and initializes a provider in one step.
    pub async fn create(config: EmbedConfig) -> Result<Self> {
        let mut provider = Self::new(config);
        provider.initialize().await?;
        Ok(provider)
    }

    /// Load model weights in a blocking task, downloading them on first use
    async fn load_model(config: EmbedConfig, model: SupportedModel) -> Result<ModelCacheEntry> {
        let (text_embedding, dimension) =
            tokio::task::spawn_blocking(move || -> Result<(TextEmbedding, usize)> {
                tracing::info!("Loading embedding model: {}", model);

                let mut init_options = InitOptions::new(model.to_fastembed())
                    .with_show_download_progress(config.show_download_progress);
                if let Some(cache_dir) = &config.cache_dir {
                    init_options = init_options.with_cache_dir(cache_dir.clone());
                }

                let mut text_embedding =
                    TextEmbedding::try_new(init_options).map_err(EmbedError::model_init)?;

                // Get dimension by generating a test embedding
                let test_embeddings = text_embedding
                    .embed(vec!["test".to_string()], None)
                    .map_err(EmbedError::model_init)?;
                let dimension = test_embeddings
                    .first()
                    .map(|emb| emb.len())
                    .unwrap_or_else(|| model.dimension());

                tracing::info!("Model loaded successfully. Dimension: {}", dimension);
                Ok((text_embedding, dimension))
            })
            .await??;

        if dimension != model.dimension() {
            tracing::warn!(
                "Model {} produced {} dimensions, expected {}",
                model,
                dimension,
                model.dimension()
            );
        }

        Ok((Arc::new(Mutex::new(text_embedding)), dimension))
    }

    /// Create a cache key based on the parts of the configuration that
    /// affect the loaded weights
    fn create_cache_key(&self) -> String {
        let mut hasher = FnvHasher::default();
        hasher.write(b"v1:");
        hasher.write(self.model_id().to_ascii_lowercase().as_bytes());
        hasher.write(b"\0");
        if let Some(dir) = &self.config.cache_dir {
            hasher.write(dir.to_string_lossy().as_bytes());
        }

        format!("v1:{:x}", hasher.finish())
    }

    /// Validate that the model is working correctly
    async fn validate_model(&self) -> Result<()> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| EmbedError::invalid_config("Model not initialized"))?;

        let model_clone = Arc::clone(model);
        let validation_result = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
            let mut model_guard = model_clone.lock().map_err(|_| EmbedError::LockPoisoned)?;
            model_guard
                .embed(vec!["validation test".to_string()], None)
                .map_err(EmbedError::model_init)
        })
        .await??;

        let embedding = validation_result.first().ok_or_else(|| {
            EmbedError::invalid_config("Model validation failed: no embeddings generated")
        })?;

        if embedding.is_empty() {
            return Err(EmbedError::invalid_config(
                "Model validation failed: empty embedding",
            ));
        }

        if embedding.len() != self.dimension {
            return Err(EmbedError::invalid_config(format!(
                "Model validation failed: expected dimension {}, got {}",
                self.dimension,
                embedding.len()
            )));
        }

        if embedding.iter().any(|value| !value.is_finite()) {
            return Err(EmbedError::invalid_config(
                "Model validation failed: non-finite values in embedding",
            ));
        }

        tracing::debug!("Model validation passed for: {}", self.config.model_name());
        Ok(())
    }

    /// Clears the global model cache. Providers already holding a model keep
    /// working; the next [`initialize`](Self::initialize) reloads.
    pub fn clear_cache() {
        if let Ok(mut cache) = get_model_cache().lock() {
            cache.clear();
            tracing::info!("Model cache cleared");
        }
    }

    /// Returns the number of loaded models in the global cache.
    pub fn cache_size() -> usize {
        get_model_cache()
            .lock()
            .map(|cache| cache.values().filter(|slot| slot.initialized()).count())
            .unwrap_or(0)
    }

    /// Get the provider configuration
    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }
}

/// Convert f32 embeddings to unit-length f16 vectors
pub(crate) fn normalize_to_f16(embeddings: Vec<Vec<f32>>) -> Vec<Vec<f16>> {
    embeddings
        .into_iter()
        .map(|embedding| {
            let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            embedding
                .into_iter()
                .map(|value| {
                    if norm > 0.0 {
                        f16::from_f32(value / norm)
                    } else {
                        f16::from_f32(value)
                    }
                })
                .collect()
        })
        .collect()
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>> {
        let texts = vec![text.to_string()];
        let result = self.embed_texts(&texts).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::embedding_gen("No embedding generated for text"))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }

        let model = self.model.as_ref().ok_or_else(|| {
            EmbedError::invalid_config("Model not initialized. Call initialize() first.")
        })?;

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.config.batch_size.max(1)) {
            let chunk = chunk.to_vec();
            let model_clone = Arc::clone(model);

            let batch_embeddings = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
                tracing::debug!("Processing batch of {} texts", chunk.len());

                let mut model_guard = model_clone.lock().map_err(|_| EmbedError::LockPoisoned)?;
                model_guard
                    .embed(chunk, None)
                    .map_err(EmbedError::embedding_gen)
            })
            .await??;

            all_embeddings.extend(normalize_to_f16(batch_embeddings));
        }

        tracing::debug!("Generated {} embeddings", all_embeddings.len());
        Ok(EmbeddingResult::new(all_embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }

    /// Canonical id of the configured model, or the raw name if it is unsupported
    fn model_id(&self) -> &str {
        self.config
            .model()
            .map_or(self.config.model_name(), |model| model.id())
    }
}
