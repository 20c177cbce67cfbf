//! Per-session query lifecycle
//!
//! ```text
//! Idle ──submit──► Processing ──ok──► Completed
//!                      │
//!                      └──error──► Failed ──► Idle
//! ```
//!
//! The orchestrator remembers the last answered query. Submitting the same
//! text again returns that answer without running the pipeline.

use crate::error::Result;
use crate::pipeline::{Answer, AnswerPipeline, Query};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Idle,
    Processing,
    Completed,
    Failed,
}

/// Result of [`Orchestrator::submit`]
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// The pipeline ran and produced a new answer
    Answered(Answer),
    /// Same text as the last answered query; the stored answer is returned
    Reused(Answer),
    /// The pipeline failed for this query; the session is usable again
    Failed(String),
    /// Another query from this session is still processing
    Busy,
    /// Blank input
    Ignored,
}

impl SubmitOutcome {
    pub fn answer(&self) -> Option<&Answer> {
        match self {
            SubmitOutcome::Answered(answer) | SubmitOutcome::Reused(answer) => Some(answer),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Session {
    state: QueryState,
    last_answer: Option<Answer>,
    last_error: Option<String>,
}

impl Session {
    fn transition(&mut self, to: QueryState) {
        debug!("Query state {:?} -> {:?}", self.state, to);
        self.state = to;
    }
}

/// Resets the session if a submission is dropped mid-flight
struct ProcessingGuard<'a> {
    session: &'a Mutex<Session>,
    armed: bool,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            warn!("Query abandoned while processing");
            session.transition(QueryState::Idle);
        }
    }
}

/// Runs one query at a time through an [`AnswerPipeline`].
pub struct Orchestrator {
    pipeline: Arc<dyn AnswerPipeline>,
    session: Mutex<Session>,
}

impl Orchestrator {
    pub fn new(pipeline: Arc<dyn AnswerPipeline>) -> Self {
        Self {
            pipeline,
            session: Mutex::new(Session {
                state: QueryState::Idle,
                last_answer: None,
                last_error: None,
            }),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> QueryState {
        self.session().state
    }

    pub fn last_answer(&self) -> Option<Answer> {
        self.session().last_answer.clone()
    }

    /// Message of the most recent failed query, cleared by the next success
    pub fn last_error(&self) -> Option<String> {
        self.session().last_error.clone()
    }

    /// Submit query text.
    ///
    /// Leading and trailing whitespace is ignored when comparing with the
    /// previous query. Per-query failures come back as
    /// [`SubmitOutcome::Failed`]; errors that make the pipeline unusable are
    /// returned as `Err`.
    pub async fn submit(&self, text: &str) -> Result<SubmitOutcome> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(SubmitOutcome::Ignored);
        }

        {
            let mut session = self.session();
            if session.state == QueryState::Processing {
                debug!("Rejecting query while another is processing");
                return Ok(SubmitOutcome::Busy);
            }
            if let Some(last) = &session.last_answer {
                if last.source_query.raw_text.trim() == trimmed {
                    info!("Query identical to the last one, reusing answer");
                    return Ok(SubmitOutcome::Reused(last.clone()));
                }
            }
            session.transition(QueryState::Processing);
        }

        let mut guard = ProcessingGuard {
            session: &self.session,
            armed: true,
        };
        let query = Query::new(text);
        let result = self.pipeline.answer(&query).await;
        guard.armed = false;

        let mut session = self.session();
        match result {
            Ok(answer) => {
                session.transition(QueryState::Completed);
                session.last_answer = Some(answer.clone());
                session.last_error = None;
                Ok(SubmitOutcome::Answered(answer))
            }
            Err(e) => {
                session.transition(QueryState::Failed);
                session.last_answer = None;
                session.last_error = Some(e.to_string());
                session.transition(QueryState::Idle);

                if e.is_fatal() {
                    warn!("Pipeline unavailable: {}", e);
                    Err(e)
                } else {
                    warn!("Query failed: {}", e);
                    Ok(SubmitOutcome::Failed(e.to_string()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CompletionError, RagError};
    use crate::pipeline::test_support::{KeywordProvider, RecordingClient, index_of};
    use crate::pipeline::RagPipeline;
    use acuadvisor_retriever::{IndexLoadError, RetrievalResult, Retriever};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use tracing_test::traced_test;

    /// Counts calls; fails the queries listed in `failures`
    #[derive(Default)]
    struct CountingPipeline {
        calls: AtomicUsize,
        failures: Mutex<VecDeque<RagError>>,
    }

    impl CountingPipeline {
        fn failing_with(errors: Vec<RagError>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures: Mutex::new(errors.into()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AnswerPipeline for CountingPipeline {
        async fn answer(&self, query: &Query) -> Result<Answer> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            Ok(Answer {
                text: format!("answer to {}", query.raw_text),
                source_query: query.clone(),
                passages: RetrievalResult::empty(),
            })
        }
    }

    /// Blocks until released
    struct GatedPipeline {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl AnswerPipeline for GatedPipeline {
        async fn answer(&self, query: &Query) -> Result<Answer> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(Answer {
                text: "done".to_string(),
                source_query: query.clone(),
                passages: RetrievalResult::empty(),
            })
        }
    }

    fn network_error() -> RagError {
        RagError::Completion(CompletionError::Service {
            status: 502,
            body: "bad gateway".to_string(),
        })
    }

    #[tokio::test]
    async fn test_identical_query_runs_once() {
        let pipeline = Arc::new(CountingPipeline::default());
        let orchestrator = Orchestrator::new(pipeline.clone());

        let first = orchestrator.submit("Treatment protocol for chronic headache").await.unwrap();
        let second = orchestrator.submit("Treatment protocol for chronic headache").await.unwrap();

        assert!(matches!(first, SubmitOutcome::Answered(_)));
        match second {
            SubmitOutcome::Reused(answer) => {
                assert_eq!(answer.text, "answer to Treatment protocol for chronic headache")
            }
            other => panic!("expected reuse, got {other:?}"),
        }
        assert_eq!(pipeline.calls(), 1);
        assert_eq!(orchestrator.state(), QueryState::Completed);
    }

    #[tokio::test]
    async fn test_memo_holds_only_last_query() {
        let pipeline = Arc::new(CountingPipeline::default());
        let orchestrator = Orchestrator::new(pipeline.clone());

        orchestrator.submit("headache").await.unwrap();
        orchestrator.submit("nausea").await.unwrap();
        let outcome = orchestrator.submit("headache").await.unwrap();

        assert!(matches!(outcome, SubmitOutcome::Answered(_)));
        assert_eq!(pipeline.calls(), 3);
    }

    #[tokio::test]
    async fn test_whitespace_variants_are_identical() {
        let pipeline = Arc::new(CountingPipeline::default());
        let orchestrator = Orchestrator::new(pipeline.clone());

        orchestrator.submit("insomnia points").await.unwrap();
        let outcome = orchestrator.submit("  insomnia points\n").await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Reused(_)));
        assert_eq!(pipeline.calls(), 1);
    }

    #[tokio::test]
    async fn test_query_text_kept_verbatim() {
        let pipeline = Arc::new(CountingPipeline::default());
        let orchestrator = Orchestrator::new(pipeline.clone());

        let outcome = orchestrator.submit("  insomnia points\n").await.unwrap();
        let answer = outcome.answer().unwrap();
        assert_eq!(answer.source_query.raw_text, "  insomnia points\n");
        assert_eq!(answer.text, "answer to   insomnia points\n");

        let again = orchestrator.submit("insomnia points").await.unwrap();
        assert!(matches!(again, SubmitOutcome::Reused(_)));
        assert_eq!(pipeline.calls(), 1);
    }

    #[tokio::test]
    async fn test_blank_input_ignored() {
        let pipeline = Arc::new(CountingPipeline::default());
        let orchestrator = Orchestrator::new(pipeline.clone());

        assert!(matches!(orchestrator.submit("   ").await.unwrap(), SubmitOutcome::Ignored));
        assert_eq!(pipeline.calls(), 0);
        assert_eq!(orchestrator.state(), QueryState::Idle);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failure_returns_to_idle() {
        let pipeline = Arc::new(CountingPipeline::failing_with(vec![network_error()]));
        let orchestrator = Orchestrator::new(pipeline.clone());

        let outcome = orchestrator.submit("headache").await.unwrap();
        match outcome {
            SubmitOutcome::Failed(message) => assert!(message.contains("HTTP 502")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(orchestrator.state(), QueryState::Idle);
        assert!(orchestrator.last_answer().is_none());
        assert!(orchestrator.last_error().is_some());
        assert!(logs_contain("Processing -> Failed"));
        assert!(logs_contain("Failed -> Idle"));

        let next = orchestrator.submit("nausea after surgery").await.unwrap();
        assert!(matches!(next, SubmitOutcome::Answered(_)));
        assert_eq!(orchestrator.state(), QueryState::Completed);
        assert!(orchestrator.last_error().is_none());
    }

    #[tokio::test]
    async fn test_failed_query_can_be_retried() {
        let pipeline = Arc::new(CountingPipeline::failing_with(vec![network_error()]));
        let orchestrator = Orchestrator::new(pipeline.clone());

        orchestrator.submit("headache").await.unwrap();
        let retry = orchestrator.submit("headache").await.unwrap();
        assert!(matches!(retry, SubmitOutcome::Answered(_)));
        assert_eq!(pipeline.calls(), 2);
    }

    #[tokio::test]
    async fn test_fatal_error_is_returned() {
        let fatal = RagError::IndexLoad(IndexLoadError::NotFound {
            path: "clinical_index.db".into(),
        });
        let pipeline = Arc::new(CountingPipeline::failing_with(vec![fatal]));
        let orchestrator = Orchestrator::new(pipeline);

        let err = orchestrator.submit("headache").await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(orchestrator.state(), QueryState::Idle);
    }

    #[tokio::test]
    async fn test_busy_while_processing() {
        let pipeline = Arc::new(GatedPipeline {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let orchestrator = Arc::new(Orchestrator::new(pipeline.clone()));

        let running = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.submit("headache").await })
        };
        pipeline.entered.notified().await;

        assert_eq!(orchestrator.state(), QueryState::Processing);
        assert!(matches!(orchestrator.submit("nausea").await.unwrap(), SubmitOutcome::Busy));

        pipeline.release.notify_one();
        let outcome = running.await.unwrap().unwrap();
        assert!(matches!(outcome, SubmitOutcome::Answered(_)));
        assert_eq!(orchestrator.state(), QueryState::Completed);
    }

    #[tokio::test]
    async fn test_dropped_submission_resets_state() {
        let pipeline = Arc::new(GatedPipeline {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let orchestrator = Orchestrator::new(pipeline.clone());

        tokio::select! {
            _ = orchestrator.submit("headache") => panic!("gated pipeline finished"),
            _ = pipeline.entered.notified() => {}
        }
        assert_eq!(orchestrator.state(), QueryState::Idle);
    }

    #[tokio::test]
    async fn test_empty_index_reaches_completed() {
        let client = Arc::new(RecordingClient::answering());
        let retriever = Retriever::new(Arc::new(KeywordProvider), Arc::new(index_of(&[]))).unwrap();
        let orchestrator = Orchestrator::new(Arc::new(RagPipeline::new(retriever, client.clone(), 5)));

        let outcome = orchestrator.submit("moxibustion contraindications").await.unwrap();
        let answer = outcome.answer().unwrap();
        assert!(answer.passages.is_empty());
        assert_eq!(orchestrator.state(), QueryState::Completed);
        assert_eq!(client.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_completion_failure_through_real_pipeline() {
        let client = Arc::new(RecordingClient::failing());
        let retriever = Retriever::new(
            Arc::new(KeywordProvider),
            Arc::new(index_of(&["Acupressure point LI4 treats headache."])),
        )
        .unwrap();
        let orchestrator = Orchestrator::new(Arc::new(RagPipeline::new(retriever, client.clone(), 5)));

        let outcome = orchestrator.submit("headache").await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Failed(_)));
        assert_eq!(orchestrator.state(), QueryState::Idle);
    }
}
