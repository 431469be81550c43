#![allow(dead_code)]

use async_trait::async_trait;
use chat_client::controller::{ChatController, ChatEvent};
use chat_client::models::{Answer, Source};
use chat_client::services::providers::{AnswerChunk, AnswerProvider, AnswerStream, ProviderError};
use chat_client::services::speech::mock::MockSpeechRecognizer;
use chat_client::services::speech::SpeechRecognizer;
use chat_client::services::{FileStorage, KeyValueStorage, MemoryStorage, SessionStore};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::Notify;
use uuid::Uuid;

pub const TEST_MODEL: &str = "scripted";

/// Provider that replays queued results and counts calls.
///
/// With a gate set, every call waits for [`ScriptedProvider::release`].
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    results: Arc<Mutex<VecDeque<Result<Answer, ProviderError>>>>,
    chunks: Arc<Mutex<Option<Vec<AnswerChunk>>>>,
    calls: Arc<AtomicUsize>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answering(text: &str, sources: Vec<Source>) -> Self {
        let provider = Self::new();
        provider.push_answer(text, sources);
        provider
    }

    pub fn failing(error: ProviderError) -> Self {
        let provider = Self::new();
        provider.push_error(error);
        provider
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Notify::new()));
        self
    }

    /// Stream these chunks instead of a single answer.
    pub fn streaming(self, chunks: Vec<AnswerChunk>) -> Self {
        *self.chunks.lock().unwrap() = Some(chunks);
        self
    }

    pub fn push_answer(&self, text: &str, sources: Vec<Source>) {
        self.results
            .lock()
            .unwrap()
            .push_back(Ok(Answer::new(text, sources)));
    }

    pub fn push_error(&self, error: ProviderError) {
        self.results.lock().unwrap().push_back(Err(error));
    }

    /// Let one waiting call proceed.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn wait_for_gate(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }
}

#[async_trait]
impl AnswerProvider for ScriptedProvider {
    async fn generate(&self, _prompt: &str) -> Result<Answer, ProviderError> {
        self.wait_for_gate().await;
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Answer::new("Default answer", Vec::new())))
    }

    async fn generate_stream(&self, prompt: &str) -> Result<AnswerStream, ProviderError> {
        let chunks = self.chunks.lock().unwrap().clone();
        match chunks {
            Some(chunks) => {
                self.wait_for_gate().await;
                Ok(Box::pin(tokio_stream::iter(chunks.into_iter().map(Ok))))
            }
            None => {
                let answer = self.generate(prompt).await?;
                let mut chunks = vec![Ok(AnswerChunk::Text(answer.text))];
                if !answer.sources.is_empty() {
                    chunks.push(Ok(AnswerChunk::Sources(answer.sources)));
                }
                Ok(Box::pin(tokio_stream::iter(chunks)))
            }
        }
    }

    fn model_name(&self) -> &str {
        TEST_MODEL
    }
}

/// A controller wired to in-memory doubles.
pub struct TestChat {
    pub controller: ChatController,
    pub events: UnboundedReceiver<ChatEvent>,
    pub provider: ScriptedProvider,
    pub recognizer: MockSpeechRecognizer,
    pub storage: MemoryStorage,
}

impl TestChat {
    pub fn spawn(provider: ScriptedProvider) -> Self {
        Self::with_parts(provider, MockSpeechRecognizer::new(true, true), MemoryStorage::new())
    }

    pub fn with_recognizer(provider: ScriptedProvider, recognizer: MockSpeechRecognizer) -> Self {
        Self::with_parts(provider, recognizer, MemoryStorage::new())
    }

    pub fn with_parts(
        provider: ScriptedProvider,
        recognizer: MockSpeechRecognizer,
        storage: MemoryStorage,
    ) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let controller = build_controller(&provider, &recognizer, Arc::new(storage.clone()))
            .with_events(tx);

        TestChat {
            controller,
            events,
            provider,
            recognizer,
            storage,
        }
    }

    /// Assemble answers from the provider's stream.
    pub fn streaming(mut self) -> Self {
        self.controller = self.controller.with_streaming(true);
        self
    }

    /// A fresh controller over the same storage, as after a restart.
    pub fn reopen(&self) -> ChatController {
        build_controller(
            &self.provider,
            &self.recognizer,
            Arc::new(self.storage.clone()),
        )
    }

    /// Events received so far.
    pub fn drain_events(&mut self) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub async fn say(&mut self, text: &str) {
        self.controller.set_input(text);
        self.controller.submit().await;
    }
}

pub fn build_controller(
    provider: &ScriptedProvider,
    recognizer: &MockSpeechRecognizer,
    storage: Arc<dyn KeyValueStorage>,
) -> ChatController {
    let provider: Arc<dyn AnswerProvider> = Arc::new(provider.clone());
    let recognizer: Arc<dyn SpeechRecognizer> = Arc::new(recognizer.clone());
    ChatController::new(SessionStore::open(storage), provider, recognizer)
}

/// Unique scratch directory, removed on drop.
pub struct TempDir {
    pub path: PathBuf,
}

impl TempDir {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("chat-client-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&path).expect("Failed to create temp dir");
        TempDir { path }
    }

    pub fn storage(&self) -> FileStorage {
        FileStorage::new(&self.path).expect("Failed to open file storage")
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

pub fn mdn() -> Source {
    Source::new("MDN", "https://developer.mozilla.org/en-US/docs/Web/CSS/flex")
}

pub fn rust_book() -> Source {
    Source::new("The Rust Book", "https://doc.rust-lang.org/book/")
}
