/// LLM Client — the single point of entry for remote completion calls.
///
/// ARCHITECTURAL RULE: No other module may call the completion provider directly.
///
/// Talks to an OpenAI-compatible `chat/completions` endpoint with `stream: true`
/// and exposes the reply as a stream of text deltas that ends only after the
/// provider's terminal `[DONE]` event.
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod sse;

use sse::SseDecoder;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const TEMPERATURE: f32 = 0.7;
const MAX_OUTPUT_TOKENS: u32 = 500;
const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const DONE_MARKER: &str = "[DONE]";
const MAX_BACKOFF_SHIFT: u32 = 10;

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

    #[error("No API key configured")]
    MissingApiKey,

    #[error("Stream ended before the completion finished")]
    Interrupted,
}

/// Text deltas of one streamed completion.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Connection settings for the completion provider.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_retries: MAX_RETRIES,
            retry_base_delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChatChunk {
    choices: Vec<ChunkChoice>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// The single LLM client. Wraps the streaming chat-completions API with retry
/// logic for the connection phase.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    settings: LlmSettings,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, settings })
    }

    /// Whether a non-blank credential is available.
    pub fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn api_key(&self) -> Option<&str> {
        self.settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Opens a streamed completion.
    /// Retries on connection errors, 429 and 5xx with exponential backoff. Once the
    /// stream is open, failures surface as stream items and are not retried.
    pub async fn stream(&self, prompt: &str, system: &str) -> Result<TextStream, LlmError> {
        let api_key = self.api_key().ok_or(LlmError::MissingApiKey)?;
        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        let request_body = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_OUTPUT_TOKENS,
            stream: true,
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..self.settings.max_retries.max(1) {
            if attempt > 0 {
                let delay = backoff_delay(self.settings.retry_base_delay, attempt);
                warn!(
                    "LLM stream attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .bearer_auth(api_key)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
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
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            debug!("LLM stream opened (model: {})", self.settings.model);
            return Ok(text_deltas(Box::pin(response.bytes_stream())));
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: self.settings.max_retries,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Streaming,
    Finished,
    Failed,
}

struct DeltaState {
    bytes: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    phase: Phase,
}

impl DeltaState {
    /// Interprets one event payload. Returns an error for provider error events.
    fn accept(&mut self, payload: &str) -> Result<(), LlmError> {
        if self.phase != Phase::Streaming {
            return Ok(());
        }
        if payload.trim() == DONE_MARKER {
            self.phase = Phase::Finished;
            return Ok(());
        }

        let chunk: ChatChunk = serde_json::from_str(payload)?;
        if let Some(error) = chunk.error {
            return Err(LlmError::Api {
                status: 200,
                message: error.message,
            });
        }
        for choice in chunk.choices {
            if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                self.pending.push_back(content);
            }
        }
        Ok(())
    }

    fn accept_all(&mut self, payloads: Vec<String>) -> Result<(), LlmError> {
        payloads.iter().try_for_each(|p| self.accept(p))
    }
}

/// Delay before retry number `attempt` (1-based): doubles each time, capped.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
    base.saturating_mul(1 << shift)
}

/// Turns an SSE byte stream into text deltas. Ends cleanly only on `[DONE]`;
/// a body that ends without it yields [`LlmError::Interrupted`].
fn text_deltas(bytes: ByteStream) -> TextStream {
    let state = DeltaState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        phase: Phase::Streaming,
    };

    Box::pin(futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(text) = st.pending.pop_front() {
                return Some((Ok(text), st));
            }
            if st.phase != Phase::Streaming {
                return None;
            }

            let result = match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    let payloads = st.decoder.feed(&chunk);
                    st.accept_all(payloads)
                }
                Some(Err(e)) => Err(LlmError::Http(e)),
                None => {
                    let tail = st.decoder.finish().into_iter().collect();
                    st.accept_all(tail).and_then(|_| match st.phase {
                        Phase::Streaming => Err(LlmError::Interrupted),
                        _ => Ok(()),
                    })
                }
            };

            if let Err(e) = result {
                st.pending.clear();
                st.phase = Phase::Failed;
                return Some((Err(e), st));
            }
        }
    }))
}
