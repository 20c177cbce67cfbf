//! Completion service client
//!
//! [`GroqClient`] talks to any OpenAI-compatible `chat/completions` endpoint;
//! by default the Groq API. One request per prompt, no streaming.

use crate::config::{ApiKey, LlmSettings};
use crate::error::CompletionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Longest error body kept in [`CompletionError::Service`]
const MAX_ERROR_BODY: usize = 512;

/// Turns a rendered prompt into answer text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;

    /// Model identifier sent with each request
    fn model(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GroqClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    timeout: Duration,
    api_key: ApiKey,
}

impl GroqClient {
    pub fn new(settings: &LlmSettings, api_key: ApiKey) -> Result<Self, CompletionError> {
        let timeout = settings.timeout();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| CompletionError::Transport { source })?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            temperature: settings.temperature,
            timeout,
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_error(&self, source: reqwest::Error) -> CompletionError {
        if source.is_timeout() {
            error!("Completion request timed out after {:?}", self.timeout);
            CompletionError::Timeout {
                timeout: self.timeout,
            }
        } else {
            error!("Completion request failed: {}", source);
            CompletionError::Transport { source }
        }
    }
}

#[async_trait]
impl CompletionClient for GroqClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let start_time = Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        info!(
            "Requesting completion from {} ({} prompt chars)",
            self.model,
            prompt.chars().count()
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.request_error(e))?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            error!("Completion service rejected the credential: HTTP {}", status.as_u16());
            return Err(CompletionError::Authentication {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            error!("Completion service error: HTTP {}", status.as_u16());
            return Err(CompletionError::Service {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| CompletionError::malformed(e.to_string()))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(CompletionError::EmptyResponse)?;
        let content = choice
            .message
            .content
            .ok_or_else(|| CompletionError::malformed("first choice has no message content"))?;

        debug!("Completion finished in {:?}", start_time.elapsed());
        info!("Received {} answer chars from {}", content.chars().count(), self.model);
        Ok(content)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
