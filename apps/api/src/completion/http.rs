//! HTTP completion client for `POST /generate-letter`.
//!
//! The endpoint streams the letter as plain text; the body ending normally is the
//! terminal event. A body that breaks off is reported as an error and never
//! returned as a letter.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{CompletedLetter, CompletionError, LetterCompleter, LetterSource, Progress};
use crate::models::FormData;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    details: Option<serde_json::Value>,
}

/// Talks to a running letter endpoint.
#[derive(Clone)]
pub struct RemoteLetterClient {
    client: Client,
    endpoint: String,
}

impl RemoteLetterClient {
    /// `endpoint` is the full URL of the letter route, e.g.
    /// `http://localhost:8080/generate-letter`.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, CompletionError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl LetterCompleter for RemoteLetterClient {
    async fn complete(
        &self,
        form: &FormData,
        progress: Progress<'_>,
    ) -> Result<CompletedLetter, CompletionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(form)
            .send()
            .await
            .map_err(send_error)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (message, details) = match serde_json::from_str::<ErrorBody>(&body) {
                Ok(parsed) => (parsed.error, parsed.details),
                Err(_) => (body, None),
            };
            warn!("Letter endpoint returned {status}: {message}");
            return Err(CompletionError::Rejected {
                status: status.as_u16(),
                message,
                details,
            });
        }

        let mut bytes = response.bytes_stream();
        let mut decoder = Utf8Accumulator::default();
        let mut text = String::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| {
                warn!("Letter stream broke off after {} chars: {e}", text.len());
                CompletionError::Interrupted
            })?;
            if decoder.push(&chunk, &mut text) {
                progress(&text);
            }
        }
        if decoder.finish(&mut text) {
            progress(&text);
        }

        debug!("Letter endpoint stream finished ({} chars)", text.chars().count());
        Ok(CompletedLetter {
            text,
            source: LetterSource::Endpoint,
        })
    }
}

/// A connection that was established but closed before the response finished is a
/// broken-off letter, not a transport failure.
fn send_error(e: reqwest::Error) -> CompletionError {
    if e.is_request() && !e.is_connect() && !e.is_timeout() {
        warn!("Letter endpoint closed the connection mid-response: {e}");
        CompletionError::Interrupted
    } else {
        CompletionError::Transport(e)
    }
}

/// Decodes UTF-8 across chunk boundaries.
#[derive(Debug, Default)]
struct Utf8Accumulator {
    pending: Vec<u8>,
}

impl Utf8Accumulator {
    /// Appends every complete character to `out`. Returns whether `out` grew.
    fn push(&mut self, chunk: &[u8], out: &mut String) -> bool {
        self.pending.extend_from_slice(chunk);
        let before = out.len();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    out.push_str(valid);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        // Incomplete sequence at the end; wait for more bytes.
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }

        out.len() > before
    }

    fn finish(&mut self, out: &mut String) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        out.push_str(&String::from_utf8_lossy(&self.pending));
        self.pending.clear();
        true
    }
}
