//! The answering pipeline: retrieve, assemble, complete.

use crate::error::Result;
use crate::llm::CompletionClient;
use crate::prompt::PromptAssembler;
use acuadvisor_retriever::{RetrievalResult, Retriever};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// A single user submission
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub raw_text: String,
    pub submission_time: DateTime<Utc>,
}

impl Query {
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            submission_time: Utc::now(),
        }
    }
}

/// The answer to one query, with the passages it was grounded in
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub source_query: Query,
    pub passages: RetrievalResult,
}

/// Something that can answer a query end to end.
#[async_trait]
pub trait AnswerPipeline: Send + Sync {
    async fn answer(&self, query: &Query) -> Result<Answer>;
}

/// Retriever → prompt assembler → completion client
pub struct RagPipeline {
    retriever: Retriever,
    assembler: PromptAssembler,
    client: Arc<dyn CompletionClient>,
    top_k: usize,
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("retriever", &self.retriever)
            .field("model", &self.client.model())
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl RagPipeline {
    pub fn new(retriever: Retriever, client: Arc<dyn CompletionClient>, top_k: usize) -> Self {
        Self {
            retriever,
            assembler: PromptAssembler,
            client,
            top_k,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }
}

#[async_trait]
impl AnswerPipeline for RagPipeline {
    async fn answer(&self, query: &Query) -> Result<Answer> {
        let start_time = Instant::now();
        info!("Answering query submitted at {}", query.submission_time);

        let passages = self.retriever.retrieve(&query.raw_text, self.top_k).await?;
        info!("Retrieved {} passages", passages.len());

        let prompt = self.assembler.assemble_result(&passages, &query.raw_text);
        let text = self.client.complete(prompt.as_str()).await?;

        info!("Answered in {:?}", start_time.elapsed());
        Ok(Answer {
            text,
            source_query: query.clone(),
            passages,
        })
    }
}
