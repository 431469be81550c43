//! Application wiring.
//!
//! Builds the long-lived pieces once (provider, storage, recognizer) and
//! hands out controllers restored from persisted state.

use crate::config::{ChatConfig, ProviderBackend, SpeechBackend};
use crate::controller::{ChatController, ChatEvent};
use crate::services::metrics;
use crate::services::providers::gemini::{GeminiAnswerProvider, GeminiConfig};
use crate::services::providers::mock::MockAnswerProvider;
use crate::services::providers::AnswerProvider;
use crate::services::speech::mock::MockSpeechRecognizer;
use crate::services::speech::{SpeechRecognizer, UnsupportedRecognizer};
use crate::services::{FileStorage, KeyValueStorage, SessionStore};
use chat_core::error::AppError;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ChatConfig,
    pub storage: Arc<dyn KeyValueStorage>,
    pub provider: Arc<dyn AnswerProvider>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
}

pub struct Application {
    state: AppState,
}

impl Application {
    pub fn build(config: ChatConfig) -> Result<Self, AppError> {
        metrics::init_metrics()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Metrics init failed: {}", e)))?;

        let provider: Arc<dyn AnswerProvider> = match config.models.provider {
            ProviderBackend::Gemini => Arc::new(
                GeminiAnswerProvider::new(GeminiConfig {
                    api_key: config.google.api_key.clone(),
                    model: config.models.text_model.clone(),
                    api_base: config.google.api_base.clone(),
                })
                .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?,
            ),
            ProviderBackend::Mock => Arc::new(MockAnswerProvider::new(true)),
        };

        tracing::info!(
            model = %provider.model_name(),
            streaming = config.models.streaming,
            "Initialized answer provider"
        );

        let storage = FileStorage::new(&config.storage.data_dir)?;
        tracing::info!(data_dir = %config.storage.data_dir, "Initialized history storage");

        let recognizer: Arc<dyn SpeechRecognizer> = match config.speech.backend {
            SpeechBackend::None => Arc::new(UnsupportedRecognizer),
            SpeechBackend::Mock => Arc::new(MockSpeechRecognizer::hearing(
                "How do I reverse a string in Rust?",
            )),
        };

        Ok(Self::with_state(AppState {
            config,
            storage: Arc::new(storage),
            provider,
            recognizer,
        }))
    }

    fn with_state(state: AppState) -> Self {
        Self { state }
    }

    /// A controller over the persisted conversation.
    ///
    /// Each call re-reads storage, so this is also how the UI reloads.
    pub fn controller(&self, events: UnboundedSender<ChatEvent>) -> ChatController {
        let store = SessionStore::open(self.state.storage.clone());
        ChatController::new(
            store,
            self.state.provider.clone(),
            self.state.recognizer.clone(),
        )
        .with_streaming(self.state.config.models.streaming)
        .with_events(events)
    }
}
