//! Process-wide cached resources
//!
//! The embedding model, the vector index and the composed pipeline are each
//! built once per process, on first use, and shared afterwards. Construction
//! is single-flight: concurrent first callers wait for one build and all
//! observe the same instance. A failed build leaves the cell empty so a later
//! call can retry.

use crate::config::{AdvisorConfig, ApiKey};
use crate::error::{RagError, Result};
use crate::llm::GroqClient;
use crate::pipeline::RagPipeline;
use acuadvisor_embed::{EmbedConfig, FastEmbedProvider};
use acuadvisor_retriever::{Retriever, VectorIndex};
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Lazily built, shared value
pub struct ResourceCell<T: ?Sized> {
    name: &'static str,
    cell: OnceCell<Arc<T>>,
}

impl<T: ?Sized> ResourceCell<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cell: OnceCell::new(),
        }
    }

    /// Return the cached value, building it with `init` if this is the first
    /// successful call. Errors from `init` are returned and not cached.
    pub async fn get_or_create<F, Fut, E>(&self, init: F) -> std::result::Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Arc<T>, E>>,
    {
        if let Some(value) = self.cell.get() {
            debug!("Reusing cached {}", self.name);
            return Ok(Arc::clone(value));
        }

        let value = self
            .cell
            .get_or_try_init(|| async move {
                info!("Creating {}", self.name);
                init().await
            })
            .await?;
        Ok(Arc::clone(value))
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Which cached resources have been built
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceStatus {
    pub embedding_provider: bool,
    pub vector_index: bool,
    pub pipeline: bool,
}

/// The three process-wide resources.
///
/// The first successful configuration wins: later calls return the cached
/// instances whatever configuration they pass.
pub struct ResourceRegistry {
    embedding_provider: ResourceCell<FastEmbedProvider>,
    vector_index: ResourceCell<VectorIndex>,
    pipeline: ResourceCell<RagPipeline>,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self {
            embedding_provider: ResourceCell::new("embedding provider"),
            vector_index: ResourceCell::new("vector index"),
            pipeline: ResourceCell::new("answer pipeline"),
        }
    }

    /// Registry shared by the whole process
    pub fn global() -> &'static ResourceRegistry {
        static INSTANCE: OnceLock<ResourceRegistry> = OnceLock::new();
        INSTANCE.get_or_init(ResourceRegistry::new)
    }

    pub fn status(&self) -> ResourceStatus {
        ResourceStatus {
            embedding_provider: self.embedding_provider.is_initialized(),
            vector_index: self.vector_index.is_initialized(),
            pipeline: self.pipeline.is_initialized(),
        }
    }

    pub async fn embedding_provider(&self, config: &EmbedConfig) -> Result<Arc<FastEmbedProvider>> {
        self.embedding_provider
            .get_or_create(|| async move {
                let provider = FastEmbedProvider::create(config.clone()).await?;
                Ok::<_, RagError>(Arc::new(provider))
            })
            .await
    }

    pub async fn vector_index(&self, path: &Path) -> Result<Arc<VectorIndex>> {
        self.vector_index
            .get_or_create(|| async move {
                let index = VectorIndex::load(path).await?;
                Ok::<_, RagError>(Arc::new(index))
            })
            .await
    }

    /// The composed pipeline. Fails with [`RagError::MissingCredential`]
    /// before building anything when no API key is configured.
    pub async fn pipeline(&self, config: &AdvisorConfig) -> Result<Arc<RagPipeline>> {
        let api_key = config.api_key()?;
        self.pipeline_with_key(config, api_key).await
    }

    /// Like [`Self::pipeline`] with an explicit credential
    pub async fn pipeline_with_key(
        &self,
        config: &AdvisorConfig,
        api_key: ApiKey,
    ) -> Result<Arc<RagPipeline>> {
        self.pipeline
            .get_or_create(|| async move {
                // Index first: a missing file fails before any model download
                let index = self.vector_index(&config.index.path).await?;
                let provider = self.embedding_provider(&config.embedding).await?;
                let retriever = Retriever::new(provider, index)?;

                let client = GroqClient::new(&config.llm, api_key)
                    .map_err(|e| RagError::config(format!("cannot build HTTP client: {e}")))?;

                Ok::<_, RagError>(Arc::new(RagPipeline::new(
                    retriever,
                    Arc::new(client),
                    config.retrieval.top_k,
                )))
            })
            .await
    }
}
