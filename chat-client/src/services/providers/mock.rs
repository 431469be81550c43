//! Mock provider implementation for tests and offline runs.

use super::{AnswerChunk, AnswerProvider, AnswerStream, ProviderError};
use crate::models::{Answer, Source};
use async_trait::async_trait;

/// Mock answer provider that echoes the prompt.
pub struct MockAnswerProvider {
    enabled: bool,
}

impl MockAnswerProvider {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    fn sources() -> Vec<Source> {
        vec![Source::new(
            "The Rust Programming Language",
            "https://doc.rust-lang.org/book/",
        )]
    }
}

#[async_trait]
impl AnswerProvider for MockAnswerProvider {
    async fn generate(&self, prompt: &str) -> Result<Answer, ProviderError> {
        if !self.enabled {
            return Err(ProviderError::AuthInvalid(
                "Mock provider not enabled".to_string(),
            ));
        }

        // Simulate some processing
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Ok(Answer::new(
            format!("Mock response for: {}", prompt),
            Self::sources(),
        ))
    }

    async fn generate_stream(&self, prompt: &str) -> Result<AnswerStream, ProviderError> {
        if !self.enabled {
            return Err(ProviderError::AuthInvalid(
                "Mock provider not enabled".to_string(),
            ));
        }

        let chunks: Vec<Result<AnswerChunk, ProviderError>> = vec![
            Ok(AnswerChunk::Text("Mock".to_string())),
            Ok(AnswerChunk::Text(" streaming".to_string())),
            Ok(AnswerChunk::Text(" response".to_string())),
            Ok(AnswerChunk::Text(" for:".to_string())),
            Ok(AnswerChunk::Text(format!(" {}", prompt))),
            Ok(AnswerChunk::Sources(Self::sources())),
        ];

        Ok(Box::pin(tokio_stream::iter(chunks)))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
