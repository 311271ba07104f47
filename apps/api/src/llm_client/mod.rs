//! LLM client: the single point of entry for all chat-model calls.
//!
//! ARCHITECTURAL RULE: No other module may call the model provider directly.
//! Handlers depend on the `LanguageModel` trait; `AnthropicClient` is the
//! production implementation.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2048;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("Stream error: {0}")]
    Stream(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a conversation, already stripped of anything provider-specific.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Incremental text produced by a streaming completion.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// The chat model as the rest of the service sees it.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Full completion, returned once generation finishes.
    async fn generate_text(&self, system: &str, messages: &[ChatMessage])
        -> Result<String, LlmError>;

    /// Streaming completion. Errors raised before the first token (bad
    /// credentials, upstream outage) surface here rather than in the stream.
    async fn stream_text(&self, system: &str, messages: &[ChatMessage])
        -> Result<TextStream, LlmError>;
}

/// Calls the model and deserializes its text response as JSON.
/// The prompt must instruct the model to return valid JSON.
pub async fn generate_structured<T: DeserializeOwned>(
    llm: &dyn LanguageModel,
    system: &str,
    prompt: &str,
) -> Result<T, LlmError> {
    let text = llm
        .generate_text(system, &[ChatMessage::user(prompt)])
        .await?;
    // Strip markdown code fences if the model wraps JSON in them
    serde_json::from_str(strip_json_fences(&text)).map_err(LlmError::Parse)
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicResponse {
    /// Concatenates the text blocks of the response.
    fn text(&self) -> Option<String> {
        let text: String = self
            .content
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Anthropic Messages API client with retry for whole completions and
/// server-sent-event parsing for streams.
#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()?,
            api_key,
            model,
        })
    }

    fn request(&self, body: &AnthropicRequest<'_>) -> reqwest::RequestBuilder {
        self.client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    async fn generate_text(
        &self,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        let request_body = AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system,
            messages,
            stream: false,
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.request(&request_body).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                return Err(api_error(status.as_u16(), response).await);
            }

            let parsed: AnthropicResponse = response.json().await?;
            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}",
                parsed.usage.input_tokens, parsed.usage.output_tokens
            );
            return parsed.text().ok_or(LlmError::EmptyContent);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    async fn stream_text(
        &self,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<TextStream, LlmError> {
        let request_body = AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system,
            messages,
            stream: true,
        };

        let response = self.request(&request_body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status.as_u16(), response).await);
        }

        Ok(text_deltas(response.bytes_stream()))
    }
}

async fn api_error(status: u16, response: reqwest::Response) -> LlmError {
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<AnthropicError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    LlmError::Api { status, message }
}

/// One parsed line of the provider's event stream.
#[derive(Debug, PartialEq)]
enum StreamChunk {
    Text(String),
    Stop,
    Error(String),
    Ignore,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<StreamDelta>,
    #[serde(default)]
    error: Option<AnthropicErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(rename = "type", default)]
    delta_type: String,
    #[serde(default)]
    text: Option<String>,
}

/// Interprets the JSON payload of one provider event.
fn parse_stream_event(data: &str) -> StreamChunk {
    let Ok(event) = serde_json::from_str::<StreamEvent>(data) else {
        return StreamChunk::Ignore;
    };
    match event.event_type.as_str() {
        "content_block_delta" => match event.delta {
            Some(StreamDelta {
                delta_type,
                text: Some(text),
            }) if delta_type == "text_delta" => StreamChunk::Text(text),
            _ => StreamChunk::Ignore,
        },
        "message_stop" => StreamChunk::Stop,
        "error" => StreamChunk::Error(
            event
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "unknown stream error".to_string()),
        ),
        _ => StreamChunk::Ignore,
    }
}

/// Turns the provider's SSE byte stream into text deltas. Framing is left to
/// `eventsource-stream`; only the delta payloads are interpreted here.
fn text_deltas<S>(bytes: S) -> TextStream
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    let events = Box::pin(bytes.eventsource());

    Box::pin(futures::stream::unfold(Some(events), |state| async move {
        let mut events = state?;
        loop {
            match events.next().await {
                Some(Ok(event)) => match parse_stream_event(&event.data) {
                    StreamChunk::Text(text) => return Some((Ok(text), Some(events))),
                    StreamChunk::Stop => return None,
                    StreamChunk::Error(message) => {
                        return Some((Err(LlmError::Stream(message)), None))
                    }
                    StreamChunk::Ignore => {}
                },
                Some(Err(e)) => return Some((Err(LlmError::Stream(e.to_string())), None)),
                None => return None,
            }
        }
    }))
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
