//! Query-text retrieval: embed, then search the vector index.

use crate::error::{IndexLoadError, RetrievalError};
use crate::index::{RetrievalResult, VectorIndex};
use acuadvisor_embed::EmbeddingProvider;
use std::sync::Arc;

/// Number of passages retrieved per query unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 5;

/// Retrieves the passages most similar to a free-text query.
///
/// The provider and index are shared (`Arc`) so that one loaded model and
/// one loaded index can serve every query in the process.
#[derive(Clone)]
pub struct Retriever {
    provider: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("provider", &self.provider.provider_name())
            .field("model", &self.provider.model_id())
            .field("chunks", &self.index.len())
            .finish()
    }
}

impl Retriever {
    /// Pair a provider with an index built by the same model.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        index: Arc<VectorIndex>,
    ) -> Result<Self, IndexLoadError> {
        index.check_compatible(provider.as_ref())?;
        Ok(Self { provider, index })
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Return up to `k` chunks ordered by descending similarity to `query_text`.
    ///
    /// Returns fewer than `k` when the index is smaller, and an empty result
    /// (not an error) when the index is empty.
    pub async fn retrieve(
        &self,
        query_text: &str,
        k: usize,
    ) -> Result<RetrievalResult, RetrievalError> {
        if self.index.is_empty() || k == 0 {
            tracing::debug!("Nothing to retrieve (index size {}, k {})", self.index.len(), k);
            return Ok(RetrievalResult::empty());
        }

        let vector = self.provider.embed_text(query_text).await?;
        let result = self.index.query(&vector, k)?;

        tracing::debug!("Retrieved {} of {} requested chunks", result.len(), k);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DistanceMetric, DocumentChunk, IndexManifest, SourceMetadata};
    use acuadvisor_embed::{EmbedError, EmbeddingResult};
    use async_trait::async_trait;
    use half::f16;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    const VOCAB: [&str; 6] = ["headache", "pregnancy", "li4", "moxibustion", "treatment", "nausea"];

    /// Bag-of-words over a fixed vocabulary
    #[derive(Default)]
    struct KeywordProvider {
        calls: AtomicUsize,
    }

    impl KeywordProvider {
        fn vectorize(text: &str) -> Vec<f16> {
            let lowered = text.to_lowercase();
            VOCAB
                .iter()
                .map(|word| f16::from_f32(lowered.matches(word).count() as f32))
                .collect()
        }
    }

    #[async_trait]
    impl EmbeddingProvider for KeywordProvider {
        async fn embed_text(&self, text: &str) -> acuadvisor_embed::Result<Vec<f16>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Self::vectorize(text))
        }

        async fn embed_texts(&self, texts: &[String]) -> acuadvisor_embed::Result<EmbeddingResult> {
            Ok(EmbeddingResult::new(texts.iter().map(|t| Self::vectorize(t)).collect()))
        }

        fn embedding_dimension(&self) -> usize {
            VOCAB.len()
        }

        fn provider_name(&self) -> &str {
            "keyword"
        }

        fn model_id(&self) -> &str {
            "keyword-v1"
        }
    }

    struct BrokenProvider;

    #[async_trait]
    impl EmbeddingProvider for BrokenProvider {
        async fn embed_text(&self, _text: &str) -> acuadvisor_embed::Result<Vec<f16>> {
            Err(EmbedError::embedding_gen("tokenizer failure"))
        }

        async fn embed_texts(&self, _texts: &[String]) -> acuadvisor_embed::Result<EmbeddingResult> {
            Err(EmbedError::embedding_gen("tokenizer failure"))
        }

        fn embedding_dimension(&self) -> usize {
            VOCAB.len()
        }

        fn provider_name(&self) -> &str {
            "broken"
        }

        fn model_id(&self) -> &str {
            "keyword-v1"
        }
    }

    fn index_of(texts: &[&str], model: &str) -> Arc<VectorIndex> {
        let chunks = texts
            .iter()
            .enumerate()
            .map(|(i, text)| DocumentChunk {
                id: i as i64 + 1,
                text: text.to_string(),
                embedding: KeywordProvider::vectorize(text),
                source: SourceMetadata::new(),
            })
            .collect();
        let manifest = IndexManifest {
            embedding_model: model.to_string(),
            dimension: VOCAB.len(),
            metric: DistanceMetric::Cosine,
        };
        Arc::new(VectorIndex::from_parts(manifest, chunks).unwrap())
    }

    #[tokio::test]
    #[traced_test]
    async fn test_retrieve_headache_chunk() {
        let index = index_of(
            &[
                "Acupressure point LI4 treats headache.",
                "Moxibustion is contraindicated in pregnancy.",
            ],
            "keyword-v1",
        );
        let retriever = Retriever::new(Arc::new(KeywordProvider::default()), index).unwrap();

        let result = retriever.retrieve("treatment for chronic headache", 1).await.unwrap();
        assert_eq!(result.texts(), vec!["Acupressure point LI4 treats headache."]);
        assert!(logs_contain("Retrieved 1 of 1 requested chunks"));

        let both = retriever.retrieve("treatment for chronic headache", 5).await.unwrap();
        assert_eq!(both.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_index_skips_embedding() {
        let provider = Arc::new(KeywordProvider::default());
        let retriever = Retriever::new(provider.clone(), index_of(&[], "keyword-v1")).unwrap();

        let result = retriever.retrieve("anything", DEFAULT_TOP_K).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_model_mismatch_rejected() {
        let err = Retriever::new(
            Arc::new(KeywordProvider::default()),
            index_of(&["LI4 treats headache"], "sentence-transformers/all-MiniLM-L6-v2"),
        )
        .unwrap_err();
        assert!(matches!(err, IndexLoadError::ModelMismatch { .. }));
    }

    #[tokio::test]
    async fn test_embedding_failure_is_retrieval_error() {
        let retriever =
            Retriever::new(Arc::new(BrokenProvider), index_of(&["LI4 treats headache"], "keyword-v1"))
                .unwrap();
        let err = retriever.retrieve("headache", 3).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Embedding(_)));
    }
}
