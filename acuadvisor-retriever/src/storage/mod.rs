//! Storage abstraction for pre-built clinical indices
//!
//! An index is produced by an external build step and only ever read here.
//! This module defines the data types shared by every backend and the
//! [`IndexSource`] trait that backends implement.
//!
//! ## Key Components
//!
//! - **DocumentChunk**: one passage of guideline text with its embedding
//! - **IndexManifest**: which model built the index, its dimension and metric
//! - **IndexSource**: read-only access to a stored index
//!
//! ## Architecture
//!
//! ```text
//! index file ── SqliteIndexStore (IndexSource) ── VectorIndex (in memory)
//! ```

use crate::error::IndexLoadError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod sqlite_store;

/// Database ID for a document chunk. Ascending IDs give insertion order.
pub type ChunkId = i64;

/// Free-form metadata about where a chunk came from (document, page, ...).
pub type SourceMetadata = serde_json::Map<String, serde_json::Value>;

/// Immutable passage of source text stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub text: String,
    pub embedding: Vec<half::f16>,
    #[serde(default)]
    pub source: SourceMetadata,
}

impl DocumentChunk {
    /// Human readable origin, taken from the `source` or `document` metadata keys
    pub fn source_label(&self) -> Option<&str> {
        ["source", "document", "title"]
            .iter()
            .find_map(|key| self.source.get(*key).and_then(|value| value.as_str()))
    }
}

/// How vectors in an index are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine similarity, higher is closer
    Cosine,
    /// Euclidean distance, lower is closer
    L2,
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::L2 => write!(f, "l2"),
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cosine" | "ip" | "inner_product" => Ok(DistanceMetric::Cosine),
            "l2" | "euclidean" => Ok(DistanceMetric::L2),
            _ => Err(format!("Invalid distance metric: {s}")),
        }
    }
}

/// Description of how an index was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Identifier of the embedding model that produced the stored vectors
    pub embedding_model: String,
    /// Length of every stored vector
    pub dimension: usize,
    /// Metric the index was built for
    pub metric: DistanceMetric,
}

/// Short listing entry for a chunk, used by inspection tooling.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkSummary {
    pub id: ChunkId,
    pub preview: String,
    pub source: SourceMetadata,
}

/// Read-only access to a stored index.
#[async_trait]
pub trait IndexSource: Send + Sync {
    /// Read the manifest describing the index
    async fn manifest(&self) -> Result<IndexManifest, IndexLoadError>;

    /// Read every chunk in insertion order
    async fn load_chunks(&self) -> Result<Vec<DocumentChunk>, IndexLoadError>;

    /// Get a specific chunk by ID
    async fn get_chunk(&self, id: ChunkId) -> Result<Option<DocumentChunk>, IndexLoadError>;

    /// List chunks in insertion order without their embeddings
    async fn list_chunks(&self, limit: usize) -> Result<Vec<ChunkSummary>, IndexLoadError>;

    /// Number of chunks stored
    async fn chunk_count(&self) -> Result<usize, IndexLoadError>;
}
