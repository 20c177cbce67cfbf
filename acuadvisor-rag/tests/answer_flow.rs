//! End to end: orchestrator → pipeline → HTTP completion endpoint
//!
//! The embedding model is replaced by a keyword provider and the completion
//! service by a mockito server; everything in between is the real code.

use acuadvisor_embed::{EmbeddingProvider, EmbeddingResult};
use acuadvisor_rag::config::LlmSettings;
use acuadvisor_rag::{
    ApiKey, GroqClient, Orchestrator, QueryState, RagPipeline, SubmitOutcome,
};
use acuadvisor_retriever::{DistanceMetric, DocumentChunk, IndexManifest, Retriever, VectorIndex};
use async_trait::async_trait;
use half::f16;
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;

const VOCAB: [&str; 4] = ["headache", "pregnancy", "moxibustion", "li4"];

struct KeywordProvider;

fn vectorize(text: &str) -> Vec<f16> {
    let lowered = text.to_lowercase();
    VOCAB
        .iter()
        .map(|word| f16::from_f32(lowered.matches(word).count() as f32))
        .collect()
}

#[async_trait]
impl EmbeddingProvider for KeywordProvider {
    async fn embed_text(&self, text: &str) -> acuadvisor_embed::Result<Vec<f16>> {
        Ok(vectorize(text))
    }

    async fn embed_texts(&self, texts: &[String]) -> acuadvisor_embed::Result<EmbeddingResult> {
        Ok(EmbeddingResult::new(texts.iter().map(|t| vectorize(t)).collect()))
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

const LI4: &str = "Acupressure point LI4 treats headache.";
const MOXA: &str = "Moxibustion is contraindicated in pregnancy.";

fn retriever(texts: &[&str]) -> Retriever {
    let chunks = texts
        .iter()
        .enumerate()
        .map(|(i, text)| DocumentChunk {
            id: i as i64 + 1,
            text: text.to_string(),
            embedding: vectorize(text),
            source: Default::default(),
        })
        .collect();
    let manifest = IndexManifest {
        embedding_model: "keyword-v1".to_string(),
        dimension: VOCAB.len(),
        metric: DistanceMetric::Cosine,
    };
    let index = VectorIndex::from_parts(manifest, chunks).unwrap();
    Retriever::new(Arc::new(KeywordProvider), Arc::new(index)).unwrap()
}

fn orchestrator(server_url: &str, texts: &[&str], top_k: usize) -> Orchestrator {
    let settings = LlmSettings {
        base_url: server_url.to_string(),
        ..LlmSettings::default()
    };
    let client = GroqClient::new(&settings, ApiKey::new("gsk_test")).unwrap();
    let pipeline = RagPipeline::new(retriever(texts), Arc::new(client), top_k);
    Orchestrator::new(Arc::new(pipeline))
}

fn completion_body(content: &str) -> String {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}]
    })
    .to_string()
}

#[tokio::test]
async fn test_headache_query_calls_service_once() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer gsk_test")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("Acupressure point LI4 treats headache\\.".to_string()),
            Matcher::Regex("Question: treatment for chronic headache".to_string()),
        ]))
        .with_status(200)
        .with_body(completion_body("1. Diagnosis criteria\n2. Treatment protocol: LI4"))
        .expect(1)
        .create_async()
        .await;

    let orchestrator = orchestrator(&server.url(), &[LI4, MOXA], 1);

    let first = orchestrator.submit("treatment for chronic headache").await.unwrap();
    let answer = first.answer().unwrap();
    assert_eq!(answer.text, "1. Diagnosis criteria\n2. Treatment protocol: LI4");
    assert_eq!(answer.passages.texts(), vec![LI4]);

    let second = orchestrator.submit("treatment for chronic headache").await.unwrap();
    assert!(matches!(second, SubmitOutcome::Reused(_)));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_moxibustion_prompt_excludes_unrelated_passage() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("Moxibustion is contraindicated".to_string()))
        .with_status(200)
        .with_body(completion_body("4. Safety considerations: avoid in pregnancy"))
        .expect(1)
        .create_async()
        .await;

    let orchestrator = orchestrator(&server.url(), &[LI4, MOXA], 1);
    let outcome = orchestrator
        .submit("Is moxibustion safe during pregnancy?")
        .await
        .unwrap();
    assert_eq!(outcome.answer().unwrap().passages.texts(), vec![MOXA]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_service_outage_then_recovery() {
    let mut server = Server::new_async().await;
    let outage = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("Question: headache relief".to_string()))
        .with_status(500)
        .with_body("internal error")
        .expect(1)
        .create_async()
        .await;
    let healthy = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("Question: moxibustion".to_string()))
        .with_status(200)
        .with_body(completion_body("answer"))
        .expect(1)
        .create_async()
        .await;

    let orchestrator = orchestrator(&server.url(), &[LI4, MOXA], 5);

    let failed = orchestrator.submit("headache relief").await.unwrap();
    match failed {
        SubmitOutcome::Failed(message) => assert!(message.contains("HTTP 500")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(orchestrator.state(), QueryState::Idle);

    let next = orchestrator.submit("moxibustion").await.unwrap();
    assert!(matches!(next, SubmitOutcome::Answered(_)));
    assert_eq!(orchestrator.state(), QueryState::Completed);

    outage.assert_async().await;
    healthy.assert_async().await;
}

#[tokio::test]
async fn test_rejected_credential_is_per_query() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body(r#"{"error": {"message": "Invalid API Key"}}"#)
        .create_async()
        .await;

    let orchestrator = orchestrator(&server.url(), &[LI4], 5);
    let outcome = orchestrator.submit("headache").await.unwrap();
    match outcome {
        SubmitOutcome::Failed(message) => {
            assert!(message.contains("rejected the credential"));
            assert!(!message.contains("gsk_test"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_index_still_answers() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex(
            // newlines are escaped inside the JSON body
            r"Analyze these clinical guidelines\\n\\n\\nQuestion: insomnia".to_string(),
        ))
        .with_status(200)
        .with_body(completion_body("No guideline passages were available."))
        .expect(1)
        .create_async()
        .await;

    let orchestrator = orchestrator(&server.url(), &[], 5);
    let outcome = orchestrator.submit("insomnia").await.unwrap();
    assert!(outcome.answer().unwrap().passages.is_empty());
    assert_eq!(orchestrator.state(), QueryState::Completed);
    mock.assert_async().await;
}
