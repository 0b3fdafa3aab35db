//! Chat-completion client for the structuring step.

use std::time::Duration;

use async_trait::async_trait;
use recurapide_core::{PipelineError, RawCompletion, StructuringInstruction};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Upper bound on generated tokens per structuring call.
pub const MAX_OUTPUT_TOKENS: u32 = 1000;
/// Sampling temperature for structuring calls.
pub const TEMPERATURE: f32 = 0.5;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("completion returned no choices")]
    NoChoices,
    #[error("completion returned empty content")]
    EmptyContent,
}

impl From<CompletionError> for PipelineError {
    fn from(err: CompletionError) -> Self {
        PipelineError::CompletionUnavailable(err.to_string())
    }
}

/// Completion service settings, built once at startup.
#[derive(Clone)]
pub struct CompletionConfig {
    pub model: String,
    pub api_key: String,
    /// API root such as `https://api.openai.com/v1`, without a trailing slash.
    pub base_url: String,
    /// Whole-request timeout for one completion call.
    pub timeout: Duration,
}

impl std::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Parameters for one completion call.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub instruction: &'a StructuringInstruction,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A text-completion capability.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Model identifier used in logs.
    fn model(&self) -> &str;

    /// Run one completion and return the first choice's text as received.
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, CompletionError>;
}

/// Send `instruction` once with the fixed output bound and temperature.
///
/// The reply is trimmed; a blank reply counts as no completion at all.
pub async fn invoke(
    backend: &dyn CompletionBackend,
    instruction: &StructuringInstruction,
) -> Result<RawCompletion, CompletionError> {
    let request = CompletionRequest {
        instruction,
        max_tokens: MAX_OUTPUT_TOKENS,
        temperature: TEMPERATURE,
    };

    info!(model = backend.model(), "requesting structuring completion");
    let text = backend.complete(&request).await?;
    let text = text.trim();
    if text.is_empty() {
        return Err(CompletionError::EmptyContent);
    }

    debug!(completion = %text, "completion received");
    Ok(RawCompletion::new(text))
}

/// OpenAI-compatible `/chat/completions` client.
pub struct ChatCompletionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionClient {
    pub fn new(config: &CompletionConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn request_body<'a>(&'a self, request: &CompletionRequest<'a>) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: request
                .instruction
                .messages()
                .into_iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

/// First choice's content; a missing or null content is returned as empty text.
fn first_choice(response: ChatResponse) -> Result<String, CompletionError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(CompletionError::NoChoices)?;
    Ok(choice.message.content.unwrap_or_default())
}

#[async_trait]
impl CompletionBackend for ChatCompletionClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, CompletionError> {
        let body = self.request_body(request);
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp.json().await?;
        info!(choices = parsed.choices.len(), "completion response received");
        first_choice(parsed)
    }
}
