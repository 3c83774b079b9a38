//! Letter completion — obtains finished letter text for a validated form.
//!
//! The remote model is preferred. Whenever it cannot be used (no credential, the
//! request fails, or the stream fails before producing text) the template letter
//! is returned instead, and callers treat both outcomes alike.

use async_trait::async_trait;
use futures::StreamExt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::generation::prompts::{build_letter_prompt, LETTER_SYSTEM};
use crate::generation::template::render_letter;
use crate::generation::validation::{validate, ValidationError};
use crate::llm_client::{LlmClient, LlmError, TextStream};
use crate::models::FormData;

pub mod http;

pub use http::RemoteLetterClient;

/// Where a finished letter came from. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LetterSource {
    /// Streamed by the completion model.
    Model,
    /// Rendered from the letter template.
    Template,
    /// Delivered by the letter endpoint, which does not report its origin.
    Endpoint,
}

/// The terminal result of a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedLetter {
    pub text: String,
    pub source: LetterSource,
}

/// Receives the text accumulated so far while a letter streams in.
/// May be called again with text that replaces, rather than extends, earlier calls.
pub type Progress<'a> = &'a (dyn Fn(&str) + Send + Sync);

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Letter request rejected (status {status}): {message}")]
    Rejected {
        status: u16,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Stream ended before the letter finished")]
    Interrupted,

    #[error("Fallback letter could not be produced")]
    FallbackFailed,
}

/// Anything that can turn a form into a finished letter.
#[async_trait]
pub trait LetterCompleter: Send + Sync {
    async fn complete(
        &self,
        form: &FormData,
        progress: Progress<'_>,
    ) -> Result<CompletedLetter, CompletionError>;
}

/// An opened letter: either a live model stream or the fallback text.
pub enum LetterStream {
    Model(TextStream),
    Template(String),
}

impl LetterStream {
    pub fn source(&self) -> LetterSource {
        match self {
            LetterStream::Model(_) => LetterSource::Model,
            LetterStream::Template(_) => LetterSource::Template,
        }
    }

    /// The letter as a stream of text pieces.
    pub fn into_stream(self) -> TextStream {
        match self {
            LetterStream::Model(stream) => stream,
            LetterStream::Template(text) => {
                Box::pin(futures::stream::once(async move { Ok(text) }))
            }
        }
    }
}

/// In-process completion: the LLM client with template fallback.
#[derive(Clone)]
pub struct CompletionService {
    llm: LlmClient,
}

impl CompletionService {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    /// Renders the template letter. Fails only if the result is blank.
    pub fn fallback(&self, form: &FormData) -> Result<String, CompletionError> {
        let letter = render_letter(form);
        if letter.trim().is_empty() {
            return Err(CompletionError::FallbackFailed);
        }
        Ok(letter)
    }

    /// Opens a letter for an already validated form.
    ///
    /// The model stream is only used once it has produced its first piece of text,
    /// so every failure up to that point resolves to the fallback.
    pub async fn open(&self, form: &FormData) -> Result<LetterStream, CompletionError> {
        if !self.llm.is_configured() {
            info!("No completion API key configured, using template letter");
            return self.fallback(form).map(LetterStream::Template);
        }

        let prompt = build_letter_prompt(form);
        let mut stream = match self.llm.stream(&prompt, LETTER_SYSTEM).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Completion request failed, using template letter: {e}");
                return self.fallback(form).map(LetterStream::Template);
            }
        };

        match stream.next().await {
            Some(Ok(first)) => {
                debug!("Completion stream produced first chunk ({} bytes)", first.len());
                let rest = futures::stream::once(async move { Ok::<_, LlmError>(first) })
                    .chain(stream);
                Ok(LetterStream::Model(Box::pin(rest)))
            }
            Some(Err(e)) => {
                warn!("Completion stream failed before any text, using template letter: {e}");
                self.fallback(form).map(LetterStream::Template)
            }
            None => {
                warn!("Completion stream was empty, using template letter");
                self.fallback(form).map(LetterStream::Template)
            }
        }
    }
}

#[async_trait]
impl LetterCompleter for CompletionService {
    async fn complete(
        &self,
        form: &FormData,
        progress: Progress<'_>,
    ) -> Result<CompletedLetter, CompletionError> {
        validate(form)?;

        let opened = self.open(form).await?;
        let source = opened.source();
        let mut stream = opened.into_stream();
        let mut text = String::new();

        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    text.push_str(&chunk);
                    progress(&text);
                }
                Err(e) => {
                    // No terminal event yet, so the template can still stand in.
                    warn!("Completion stream interrupted, using template letter: {e}");
                    let letter = self.fallback(form)?;
                    progress(&letter);
                    return Ok(CompletedLetter {
                        text: letter,
                        source: LetterSource::Template,
                    });
                }
            }
        }

        info!("Letter completed ({:?}, {} chars)", source, text.chars().count());
        Ok(CompletedLetter { text, source })
    }
}
