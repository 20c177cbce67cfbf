//! In-memory vector index over pre-built document chunks
//!
//! The whole index is read into memory once and searched exactly. Ranking is
//! by descending similarity; equal scores keep insertion order so results
//! are deterministic.

use crate::error::{IndexLoadError, RetrievalError};
use crate::storage::sqlite_store::SqliteIndexStore;
use crate::storage::{DistanceMetric, DocumentChunk, IndexManifest, IndexSource};
use acuadvisor_embed::EmbeddingProvider;
use half::f16;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// A chunk paired with its similarity to the query. Higher is closer.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Arc<DocumentChunk>,
    pub score: f32,
}

/// Ranked retrieval output, at most `k` entries ordered by descending score.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    /// An empty result
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn hits(&self) -> &[ScoredChunk] {
        &self.hits
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScoredChunk> {
        self.hits.iter()
    }

    /// Chunk texts in ranking order
    pub fn texts(&self) -> Vec<&str> {
        self.hits.iter().map(|hit| hit.chunk.text.as_str()).collect()
    }
}

impl IntoIterator for RetrievalResult {
    type Item = ScoredChunk;
    type IntoIter = std::vec::IntoIter<ScoredChunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.into_iter()
    }
}

impl<'a> IntoIterator for &'a RetrievalResult {
    type Item = &'a ScoredChunk;
    type IntoIter = std::slice::Iter<'a, ScoredChunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.iter()
    }
}

/// Summary numbers for an index
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub chunk_count: usize,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub embedding_model: String,
}

/// Exact nearest-neighbour index held in memory.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    manifest: IndexManifest,
    chunks: Vec<Arc<DocumentChunk>>,
}

impl VectorIndex {
    /// Build an index from a manifest and chunks in insertion order.
    ///
    /// Every chunk must carry a vector of the manifest dimension.
    pub fn from_parts(
        manifest: IndexManifest,
        chunks: Vec<DocumentChunk>,
    ) -> Result<Self, IndexLoadError> {
        if manifest.dimension == 0 {
            return Err(IndexLoadError::InvalidManifest {
                key: "dimension".to_string(),
                value: "0".to_string(),
            });
        }

        for chunk in &chunks {
            if chunk.embedding.len() != manifest.dimension {
                tracing::error!(
                    "Chunk {} has {} dimensions, index declares {}",
                    chunk.id,
                    chunk.embedding.len(),
                    manifest.dimension
                );
                return Err(IndexLoadError::DimensionMismatch {
                    expected: manifest.dimension,
                    found: chunk.embedding.len(),
                });
            }
        }

        Ok(Self {
            manifest,
            chunks: chunks.into_iter().map(Arc::new).collect(),
        })
    }

    /// Read a complete index from any source
    pub async fn from_source(source: &dyn IndexSource) -> Result<Self, IndexLoadError> {
        let manifest = source.manifest().await?;
        let chunks = source.load_chunks().await?;
        Self::from_parts(manifest, chunks)
    }

    /// Load an index file
    pub async fn load(path: &Path) -> Result<Self, IndexLoadError> {
        tracing::info!("Loading vector index from {}", path.display());
        let store = SqliteIndexStore::open(path).await?;
        let index = Self::from_source(&store).await?;
        tracing::info!(
            "Loaded {} chunks ({} dims, {}, model {})",
            index.len(),
            index.manifest.dimension,
            index.manifest.metric,
            index.manifest.embedding_model
        );
        Ok(index)
    }

    /// Load an index file and check it was built with `provider`'s model
    pub async fn load_for(
        path: &Path,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Self, IndexLoadError> {
        let index = Self::load(path).await?;
        index.check_compatible(provider)?;
        Ok(index)
    }

    /// Check that vectors from `provider` are comparable with the stored ones.
    pub fn check_compatible(&self, provider: &dyn EmbeddingProvider) -> Result<(), IndexLoadError> {
        if !self
            .manifest
            .embedding_model
            .eq_ignore_ascii_case(provider.model_id())
        {
            return Err(IndexLoadError::ModelMismatch {
                index_model: self.manifest.embedding_model.clone(),
                provider_model: provider.model_id().to_string(),
            });
        }
        if self.manifest.dimension != provider.embedding_dimension() {
            return Err(IndexLoadError::DimensionMismatch {
                expected: self.manifest.dimension,
                found: provider.embedding_dimension(),
            });
        }
        Ok(())
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            chunk_count: self.len(),
            dimension: self.manifest.dimension,
            metric: self.manifest.metric,
            embedding_model: self.manifest.embedding_model.clone(),
        }
    }

    /// Return up to `k` chunks most similar to `vector`.
    ///
    /// An empty index always yields an empty result.
    pub fn query(&self, vector: &[f16], k: usize) -> Result<RetrievalResult, RetrievalError> {
        if self.chunks.is_empty() || k == 0 {
            return Ok(RetrievalResult::empty());
        }
        if vector.len() != self.manifest.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.manifest.dimension,
                found: vector.len(),
            });
        }

        let query: Vec<f32> = vector.iter().map(|value| value.to_f32()).collect();
        let mut scored: Vec<ScoredChunk> = self
            .chunks
            .iter()
            .map(|chunk| {
                let score = similarity(self.manifest.metric, &query, &chunk.embedding);
                ScoredChunk {
                    chunk: Arc::clone(chunk),
                    score: if score.is_nan() { f32::NEG_INFINITY } else { score },
                }
            })
            .collect();

        // sort_by is stable: ties stay in insertion order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);

        tracing::debug!(
            "Top score {:.4} over {} chunks",
            scored.first().map(|hit| hit.score).unwrap_or_default(),
            self.chunks.len()
        );
        Ok(RetrievalResult { hits: scored })
    }
}

/// Similarity under `metric`, oriented so that higher is closer.
pub fn similarity(metric: DistanceMetric, query: &[f32], stored: &[f16]) -> f32 {
    match metric {
        DistanceMetric::Cosine => cosine_similarity(query, stored),
        DistanceMetric::L2 => 1.0 / (1.0 + l2_distance(query, stored)),
    }
}

/// Cosine similarity; zero for mismatched lengths or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f16]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot_product = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (a_value, b_value) in a.iter().zip(b) {
        let b_f32 = b_value.to_f32();
        dot_product += a_value * b_f32;
        norm_a += a_value * a_value;
        norm_b += b_f32 * b_f32;
    }

    let norm_a = norm_a.sqrt();
    let norm_b = norm_b.sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

/// Euclidean distance; infinite for mismatched lengths
pub fn l2_distance(a: &[f32], b: &[f16]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b)
        .map(|(a_value, b_value)| {
            let diff = a_value - b_value.to_f32();
            diff * diff
        })
        .sum::<f32>()
        .sqrt()
}
