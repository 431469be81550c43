//! Answer provider abstractions and implementations.
//!
//! A provider wraps the one remote call the client makes: a prompt goes
//! out, generated text and its cited sources come back. Implementations
//! never retry; that policy belongs to the caller.

pub mod gemini;
pub mod mock;

use crate::models::{Answer, Source};
use async_trait::async_trait;
use std::pin::Pin;
use thiserror::Error;
use tokio_stream::Stream;

/// Text shown when the model answered with nothing.
pub const EMPTY_ANSWER_FALLBACK: &str =
    "I'm having a little trouble thinking right now. Could you ask that again?";

/// Title given to a cited page that came back without one.
pub const DEFAULT_SOURCE_TITLE: &str = "Reference";

/// Classified provider failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Rate limited")]
    RateLimited,

    #[error("Invalid credentials: {0}")]
    AuthInvalid(String),

    #[error("Content rejected by safety filter")]
    ContentRejected,

    #[error("Provider error: {0}")]
    Generic(String),
}

impl ProviderError {
    /// The text shown to the user in place of an answer.
    pub fn user_message(&self) -> &'static str {
        match self {
            ProviderError::RateLimited => {
                "I'm getting too many questions right now! Please give me a moment to rest."
            }
            ProviderError::AuthInvalid(_) => {
                "It looks like my access key is missing or invalid. Please check the setup."
            }
            ProviderError::ContentRejected => {
                "I can't answer that question due to safety guidelines. Can we talk about coding instead?"
            }
            ProviderError::Generic(_) => "Oops! Something went wrong. Please try again.",
        }
    }

    /// Metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::RateLimited => "rate_limited",
            ProviderError::AuthInvalid(_) => "auth_invalid",
            ProviderError::ContentRejected => "content_rejected",
            ProviderError::Generic(_) => "generic",
        }
    }
}

/// Classify a failed call from its HTTP status (when one was received)
/// and whatever error text came with it.
pub fn classify_failure(status: Option<u16>, body: &str) -> ProviderError {
    if status == Some(429) || body.contains("429") || body.contains("RESOURCE_EXHAUSTED") {
        return ProviderError::RateLimited;
    }

    if body.contains("API key") || body.contains("API_KEY_INVALID") {
        return ProviderError::AuthInvalid(body.to_string());
    }

    if matches!(status, Some(401) | Some(403)) {
        return ProviderError::AuthInvalid(format!("HTTP {}", status.unwrap_or_default()));
    }

    if body.contains("SAFETY") {
        return ProviderError::ContentRejected;
    }

    match status {
        Some(code) => ProviderError::Generic(format!("HTTP {}: {}", code, body)),
        None => ProviderError::Generic(body.to_string()),
    }
}

/// Piece of a streamed answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerChunk {
    /// Text to append to what has arrived so far.
    Text(String),

    /// Sources cited by the answer, in citation order.
    Sources(Vec<Source>),
}

/// Type alias for provider streams.
pub type AnswerStream = Pin<Box<dyn Stream<Item = Result<AnswerChunk, ProviderError>> + Send>>;

/// Trait for answer generation backends (e.g., Gemini).
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    /// Generate a complete answer for a non-empty prompt.
    async fn generate(&self, prompt: &str) -> Result<Answer, ProviderError>;

    /// Generate an answer incrementally.
    ///
    /// The default implementation yields the complete answer as one text
    /// chunk followed by its sources.
    async fn generate_stream(&self, prompt: &str) -> Result<AnswerStream, ProviderError> {
        let answer = self.generate(prompt).await?;
        let mut chunks = vec![Ok(AnswerChunk::Text(answer.text))];
        if !answer.sources.is_empty() {
            chunks.push(Ok(AnswerChunk::Sources(answer.sources)));
        }
        Ok(Box::pin(tokio_stream::iter(chunks)))
    }

    /// Model identifier, for logs and the status line.
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_429_is_rate_limited() {
        assert_eq!(
            classify_failure(Some(429), "quota exceeded"),
            ProviderError::RateLimited
        );
        assert_eq!(
            classify_failure(Some(400), r#"{"status":"RESOURCE_EXHAUSTED"}"#),
            ProviderError::RateLimited
        );
    }

    #[test]
    fn code_429_in_error_text_is_rate_limited_under_any_status() {
        assert_eq!(
            classify_failure(Some(500), r#"{"error":{"code":429,"message":"Too many requests"}}"#),
            ProviderError::RateLimited
        );
        assert_eq!(
            classify_failure(None, "upstream returned 429"),
            ProviderError::RateLimited
        );
    }

    #[test]
    fn key_errors_are_credential_failures() {
        let err = classify_failure(Some(400), "API key not valid. Please pass a valid API key.");
        assert!(matches!(err, ProviderError::AuthInvalid(_)));

        let err = classify_failure(Some(403), "permission denied");
        assert!(matches!(err, ProviderError::AuthInvalid(_)));
    }

    #[test]
    fn safety_signal_is_content_rejection() {
        assert_eq!(
            classify_failure(Some(400), "blocked: SAFETY"),
            ProviderError::ContentRejected
        );
    }

    #[test]
    fn everything_else_is_generic() {
        assert!(matches!(
            classify_failure(Some(500), "internal"),
            ProviderError::Generic(_)
        ));
        assert!(matches!(
            classify_failure(None, "connection refused"),
            ProviderError::Generic(_)
        ));
    }

    #[test]
    fn user_messages_match_each_class() {
        assert!(ProviderError::RateLimited
            .user_message()
            .contains("too many questions"));
        assert!(ProviderError::AuthInvalid(String::new())
            .user_message()
            .contains("access key"));
        assert!(ProviderError::ContentRejected
            .user_message()
            .contains("safety guidelines"));
        assert_eq!(
            ProviderError::Generic("boom".into()).user_message(),
            "Oops! Something went wrong. Please try again."
        );
    }
}
