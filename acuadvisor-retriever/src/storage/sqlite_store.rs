//! SQLite index files
//!
//! A pre-built index is a single SQLite file. It is opened read-only; this
//! crate never creates or modifies one.
//!
//! ## File Format
//!
//! ```sql
//! -- one row per manifest entry: embedding_model, dimension, metric
//! CREATE TABLE index_meta (
//!     key TEXT PRIMARY KEY,
//!     value TEXT NOT NULL
//! );
//!
//! -- one row per chunk; id order is insertion order
//! CREATE TABLE chunks (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     content TEXT NOT NULL,
//!     source TEXT NOT NULL DEFAULT '{}',  -- JSON object
//!     embedding BLOB NOT NULL             -- little-endian f16 values
//! );
//! ```
//!
//! [`INDEX_SCHEMA`] and [`encode_embedding`] are public so external build
//! tooling can produce compatible files.

use super::{ChunkId, ChunkSummary, DistanceMetric, DocumentChunk, IndexManifest, IndexSource};
use crate::error::IndexLoadError;
use async_trait::async_trait;
use half::f16;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// DDL describing the on-disk index format
pub const INDEX_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content TEXT NOT NULL,
    source TEXT NOT NULL DEFAULT '{}',
    embedding BLOB NOT NULL
);
"#;

/// Manifest key for the embedding model identifier
pub const META_EMBEDDING_MODEL: &str = "embedding_model";
/// Manifest key for the vector dimension
pub const META_DIMENSION: &str = "dimension";
/// Manifest key for the distance metric
pub const META_METRIC: &str = "metric";

const PREVIEW_CHARS: usize = 120;

/// Serialize a vector the way index files store it
pub fn encode_embedding(embedding: &[f16]) -> Vec<u8> {
    embedding.iter().flat_map(|value| value.to_le_bytes()).collect()
}

/// Parse a stored vector. Returns `None` if the blob length is odd.
pub fn decode_embedding(bytes: &[u8]) -> Option<Vec<f16>> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(2)
            .map(|pair| f16::from_le_bytes([pair[0], pair[1]]))
            .collect(),
    )
}

/// Read-only view over an index file.
#[derive(Debug, Clone)]
pub struct SqliteIndexStore {
    path: PathBuf,
    pool: SqlitePool,
}

impl SqliteIndexStore {
    /// Opens an existing index file for reading.
    pub async fn open(path: &Path) -> Result<Self, IndexLoadError> {
        if !path.is_file() {
            tracing::error!("Index file not found: {}", path.display());
            return Err(IndexLoadError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(path)
                    .read_only(true)
                    .create_if_missing(false)
                    .busy_timeout(std::time::Duration::from_secs(5)),
            )
            .await?;

        tracing::debug!("Opened index file {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            pool,
        })
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_source(id: ChunkId, raw: Option<String>) -> Result<super::SourceMetadata, IndexLoadError> {
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(super::SourceMetadata::new()),
            Some(json) => serde_json::from_str(json).map_err(|e| IndexLoadError::CorruptChunk {
                id,
                reason: format!("source metadata is not a JSON object: {e}"),
            }),
        }
    }

    fn row_to_chunk(row: &SqliteRow) -> Result<DocumentChunk, IndexLoadError> {
        let id: i64 = row.try_get("id")?;
        let text: String = row.try_get("content")?;
        let source: Option<String> = row.try_get("source")?;
        let embedding_bytes: Vec<u8> = row.try_get("embedding")?;

        let embedding =
            decode_embedding(&embedding_bytes).ok_or_else(|| IndexLoadError::CorruptChunk {
                id,
                reason: format!("embedding blob has odd length {}", embedding_bytes.len()),
            })?;

        Ok(DocumentChunk {
            id,
            text,
            embedding,
            source: Self::parse_source(id, source)?,
        })
    }
}

fn manifest_value<'a>(
    entries: &'a HashMap<String, String>,
    key: &str,
) -> Result<&'a str, IndexLoadError> {
    entries
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| IndexLoadError::MissingManifestKey {
            key: key.to_string(),
        })
}

#[async_trait]
impl IndexSource for SqliteIndexStore {
    async fn manifest(&self) -> Result<IndexManifest, IndexLoadError> {
        let rows = sqlx::query("SELECT key, value FROM index_meta")
            .fetch_all(&self.pool)
            .await?;

        let mut entries = HashMap::new();
        for row in rows {
            let key: String = row.try_get("key")?;
            let value: String = row.try_get("value")?;
            entries.insert(key, value);
        }

        let embedding_model = manifest_value(&entries, META_EMBEDDING_MODEL)?.to_string();

        let raw_dimension = manifest_value(&entries, META_DIMENSION)?;
        let dimension = raw_dimension
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|dimension| *dimension > 0)
            .ok_or_else(|| IndexLoadError::InvalidManifest {
                key: META_DIMENSION.to_string(),
                value: raw_dimension.to_string(),
            })?;

        let raw_metric = manifest_value(&entries, META_METRIC)?;
        let metric = raw_metric
            .parse::<DistanceMetric>()
            .map_err(|_| IndexLoadError::InvalidManifest {
                key: META_METRIC.to_string(),
                value: raw_metric.to_string(),
            })?;

        Ok(IndexManifest {
            embedding_model,
            dimension,
            metric,
        })
    }

    async fn load_chunks(&self) -> Result<Vec<DocumentChunk>, IndexLoadError> {
        let rows = sqlx::query("SELECT id, content, source, embedding FROM chunks ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        let chunks = rows
            .iter()
            .map(Self::row_to_chunk)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("Read {} chunks from {}", chunks.len(), self.path.display());
        Ok(chunks)
    }

    async fn get_chunk(&self, id: ChunkId) -> Result<Option<DocumentChunk>, IndexLoadError> {
        let row = sqlx::query("SELECT id, content, source, embedding FROM chunks WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_chunk).transpose()
    }

    async fn list_chunks(&self, limit: usize) -> Result<Vec<ChunkSummary>, IndexLoadError> {
        let rows = sqlx::query("SELECT id, content, source FROM chunks ORDER BY id LIMIT ?1")
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let content: String = row.try_get("content")?;
            let source: Option<String> = row.try_get("source")?;
            summaries.push(ChunkSummary {
                id,
                preview: content.chars().take(PREVIEW_CHARS).collect(),
                source: Self::parse_source(id, source)?,
            });
        }
        Ok(summaries)
    }

    async fn chunk_count(&self) -> Result<usize, IndexLoadError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Writes fixture index files the way an external build step would.

    use super::*;

    pub(crate) async fn write_index(
        path: &Path,
        manifest: &[(&str, &str)],
        chunks: &[(&str, &str, Vec<f16>)],
    ) -> anyhow::Result<()> {
        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
        )
        .await?;
        sqlx::raw_sql(INDEX_SCHEMA).execute(&pool).await?;

        for (key, value) in manifest {
            sqlx::query("INSERT INTO index_meta (key, value) VALUES (?1, ?2)")
                .bind(*key)
                .bind(*value)
                .execute(&pool)
                .await?;
        }
        for (content, source, embedding) in chunks {
            sqlx::query("INSERT INTO chunks (content, source, embedding) VALUES (?1, ?2, ?3)")
                .bind(*content)
                .bind(*source)
                .bind(encode_embedding(embedding))
                .execute(&pool)
                .await?;
        }
        pool.close().await;
        Ok(())
    }

    pub(crate) fn vector(values: &[f32]) -> Vec<f16> {
        values.iter().copied().map(f16::from_f32).collect()
    }
}
