//! Chat session controller.
//!
//! Owns the input buffer, the loading lifecycle and voice capture, and is
//! the only writer of the [`SessionStore`]. A turn is split in two so the
//! caller can keep handling input while the answer is in flight:
//! [`ChatController::begin_submit`] records the user message and hands
//! back a [`Turn`]; the caller runs it and passes the result to
//! [`ChatController::complete_turn`]. While a turn is loading, further
//! submissions are dropped, not queued.

pub mod caption;
pub mod events;

pub use caption::{CAPTION_INTERVAL, STATUS_CAPTIONS};
pub use events::ChatEvent;

use crate::models::{Answer, Message};
use crate::services::metrics;
use crate::services::providers::{
    AnswerChunk, AnswerProvider, ProviderError, EMPTY_ANSWER_FALLBACK,
};
use crate::services::speech::{RecognitionEvent, RecognitionSession, SpeechRecognizer, VoiceError};
use crate::services::SessionStore;
use caption::CaptionTicker;
use events::EventSink;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

/// Question shown before the conversation is wiped.
pub const CLEAR_CONFIRMATION_PROMPT: &str = "Start a new conversation?";

/// Starter questions offered on an empty conversation.
pub const SUGGESTIONS: [Suggestion; 4] = [
    Suggestion {
        title: "Debug React",
        query: "Why is my useEffect running twice?",
    },
    Suggestion {
        title: "Python Help",
        query: "Write a script to scrape a website",
    },
    Suggestion {
        title: "CSS Tricks",
        query: "How do I center a div using Grid?",
    },
    Suggestion {
        title: "Database",
        query: "Explain SQL JOIN types with examples",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suggestion {
    pub title: &'static str,
    pub query: &'static str,
}

/// Request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadingState {
    #[default]
    Idle,
    Loading,
    Error,
}

/// Voice capture sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    #[default]
    Off,
    Listening,
}

/// How a finished turn was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The answer was appended.
    Answered(Message),

    /// The failure text was appended as a model message.
    Failed { error: ProviderError, message: String },

    /// The conversation was cleared while the turn was in flight.
    Discarded,
}

/// Result of a clear request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    Cleared,
    NothingToClear,
    Cancelled,
}

/// Result of a voice toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceToggle {
    Started,
    Stopped,
    Rejected(VoiceError),
}

/// One in-flight request to the answer provider.
pub struct Turn {
    id: String,
    prompt: String,
    provider: Arc<dyn AnswerProvider>,
    streaming: bool,
    events: EventSink,
}

impl Turn {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Ask the provider for an answer.
    ///
    /// When streaming, partial text is published as [`ChatEvent::Draft`]
    /// and the pieces are assembled here.
    #[tracing::instrument(skip(self), fields(turn_id = %self.id, prompt_len = self.prompt.len()))]
    pub async fn run(&self) -> Result<Answer, ProviderError> {
        let started = Instant::now();
        let result = if self.streaming {
            self.run_streaming().await
        } else {
            self.provider.generate(&self.prompt).await
        };

        let model = self.provider.model_name();
        metrics::record_provider_latency(model, started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            metrics::record_provider_error(model, e.kind());
        }
        result
    }

    async fn run_streaming(&self) -> Result<Answer, ProviderError> {
        let mut stream = self.provider.generate_stream(&self.prompt).await?;
        let mut draft = Message::draft(String::new(), Vec::new());
        let mut sources = Vec::new();

        while let Some(chunk) = stream.next().await {
            match chunk? {
                AnswerChunk::Text(delta) => {
                    draft.content.push_str(&delta);
                    self.events.emit(ChatEvent::Draft(draft.clone()));
                }
                AnswerChunk::Sources(more) => {
                    sources.extend(more);
                    draft.sources = Some(sources.clone());
                }
            }
        }

        let text = if draft.content.trim().is_empty() {
            EMPTY_ANSWER_FALLBACK.to_string()
        } else {
            draft.content
        };
        Ok(Answer::new(text, sources))
    }
}

/// Live recognition session. Stopped when dropped.
struct ActiveRecognition {
    session: Box<dyn RecognitionSession>,
}

impl Drop for ActiveRecognition {
    fn drop(&mut self) {
        self.session.stop();
    }
}

pub struct ChatController {
    store: SessionStore,
    provider: Arc<dyn AnswerProvider>,
    recognizer: Arc<dyn SpeechRecognizer>,
    streaming: bool,
    input: String,
    state: LoadingState,
    last_error: Option<String>,
    in_flight: Option<String>,
    caption: Option<CaptionTicker>,
    recognition: Option<ActiveRecognition>,
    events: EventSink,
}

impl ChatController {
    pub fn new(
        store: SessionStore,
        provider: Arc<dyn AnswerProvider>,
        recognizer: Arc<dyn SpeechRecognizer>,
    ) -> Self {
        Self {
            store,
            provider,
            recognizer,
            streaming: false,
            input: String::new(),
            state: LoadingState::Idle,
            last_error: None,
            in_flight: None,
            caption: None,
            recognition: None,
            events: EventSink::default(),
        }
    }

    /// Assemble answers from the provider's stream instead of one response.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_events(mut self, tx: UnboundedSender<ChatEvent>) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    pub fn state(&self) -> LoadingState {
        self.state
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, value: impl Into<String>) {
        self.input = value.into();
        self.events.emit(ChatEvent::InputChanged(self.input.clone()));
    }

    /// Failure text of the last turn, while in [`LoadingState::Error`].
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Current rotating caption, while loading.
    pub fn status_caption(&self) -> Option<&'static str> {
        self.caption.as_ref().map(CaptionTicker::current)
    }

    pub fn voice_state(&self) -> VoiceState {
        if self.recognition.is_some() {
            VoiceState::Listening
        } else {
            VoiceState::Off
        }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Put a starter question in the input buffer.
    pub fn use_suggestion(&mut self, index: usize) -> bool {
        match SUGGESTIONS.get(index) {
            Some(suggestion) => {
                self.set_input(suggestion.query);
                true
            }
            None => false,
        }
    }

    /// Whether the submit action is currently available.
    pub fn can_submit(&self) -> bool {
        self.state != LoadingState::Loading && !self.input.trim().is_empty()
    }

    /// Whether there is anything to clear.
    pub fn can_clear(&self) -> bool {
        !self.store.is_empty()
    }

    /// Start a turn from the input buffer.
    ///
    /// Returns `None` when the input is blank or a turn is already loading.
    /// Otherwise the user message is appended, the input cleared and the
    /// controller enters [`LoadingState::Loading`]. Must be called from
    /// within a Tokio runtime, which drives the caption timer.
    pub fn begin_submit(&mut self) -> Option<Turn> {
        if self.state == LoadingState::Loading {
            tracing::debug!("Submission dropped while loading");
            return None;
        }

        let prompt = self.input.trim().to_string();
        if prompt.is_empty() {
            return None;
        }

        self.append(Message::user(prompt.clone()));
        self.set_input(String::new());

        let turn = Turn {
            id: uuid::Uuid::new_v4().to_string(),
            prompt,
            provider: self.provider.clone(),
            streaming: self.streaming,
            events: self.events.clone(),
        };

        self.in_flight = Some(turn.id.clone());
        self.last_error = None;
        self.caption = Some(CaptionTicker::start(self.events.clone()));
        self.set_state(LoadingState::Loading);

        tracing::info!(
            turn_id = %turn.id,
            prompt_len = turn.prompt.len(),
            message_count = self.store.len(),
            "Turn started"
        );
        Some(turn)
    }

    /// Apply the provider's result for `turn`.
    pub fn complete_turn(
        &mut self,
        turn: Turn,
        result: Result<Answer, ProviderError>,
    ) -> TurnOutcome {
        if self.in_flight.as_deref() != Some(turn.id.as_str()) {
            tracing::info!(turn_id = %turn.id, "Discarding result of a cleared turn");
            return TurnOutcome::Discarded;
        }
        self.in_flight = None;
        self.caption = None;

        match result {
            Ok(answer) => {
                let message = Message::model(answer.text, answer.sources);
                tracing::info!(
                    turn_id = %turn.id,
                    source_count = message.sources().len(),
                    "Turn answered"
                );
                self.append(message.clone());
                self.set_state(LoadingState::Idle);
                metrics::record_turn("success");
                TurnOutcome::Answered(message)
            }
            Err(error) => {
                let text = error.user_message().to_string();
                tracing::warn!(turn_id = %turn.id, error = %error, "Turn failed");
                self.append(Message::model_error(text.clone()));
                self.last_error = Some(text.clone());
                self.set_state(LoadingState::Error);
                metrics::record_turn("error");
                TurnOutcome::Failed {
                    error,
                    message: text,
                }
            }
        }
    }

    /// Run a whole turn: begin, wait for the provider, complete.
    pub async fn submit(&mut self) -> Option<TurnOutcome> {
        let turn = self.begin_submit()?;
        let result = turn.run().await;
        Some(self.complete_turn(turn, result))
    }

    /// Wipe the conversation once the user has confirmed.
    pub fn clear(&mut self, confirmed: bool) -> ClearOutcome {
        if self.store.is_empty() {
            return ClearOutcome::NothingToClear;
        }
        if !confirmed {
            return ClearOutcome::Cancelled;
        }

        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "Cleared history could not be persisted");
            self.events
                .emit(ChatEvent::Notice("Couldn't save chat history.".to_string()));
        }
        self.in_flight = None;
        self.caption = None;
        self.last_error = None;
        self.events.emit(ChatEvent::Cleared);
        self.set_state(LoadingState::Idle);

        tracing::info!("Conversation cleared");
        ClearOutcome::Cleared
    }

    /// Start or stop voice capture.
    pub async fn toggle_voice(&mut self) -> VoiceToggle {
        if self.recognition.take().is_some() {
            self.events.emit(ChatEvent::VoiceChanged(VoiceState::Off));
            return VoiceToggle::Stopped;
        }

        if !self.recognizer.is_supported() {
            return self.reject_voice(VoiceError::Unsupported);
        }

        if let Err(e) = self.recognizer.request_microphone().await {
            return self.reject_voice(e);
        }

        match self.recognizer.start() {
            Ok(session) => {
                self.recognition = Some(ActiveRecognition { session });
                self.events.emit(ChatEvent::VoiceChanged(VoiceState::Listening));
                tracing::debug!("Voice capture started");
                VoiceToggle::Started
            }
            Err(e) => self.reject_voice(e),
        }
    }

    /// Wait for the active recognition session to report something.
    ///
    /// Pends forever when not listening, so it can sit in a `select!`.
    pub async fn next_voice_event(&mut self) -> RecognitionEvent {
        match self.recognition.as_mut() {
            Some(active) => active.session.next_event().await,
            None => std::future::pending().await,
        }
    }

    /// Apply a recognition event to the input buffer and voice state.
    pub fn apply_voice_event(&mut self, event: RecognitionEvent) {
        match event {
            RecognitionEvent::Result(transcript) => {
                let transcript = transcript.trim();
                if transcript.is_empty() {
                    return;
                }
                let joined = if self.input.is_empty() {
                    transcript.to_string()
                } else {
                    format!("{} {}", self.input, transcript)
                };
                self.set_input(joined);
            }
            RecognitionEvent::Error(reason) => {
                tracing::warn!(reason = %reason, "Voice capture failed");
                self.stop_listening();
            }
            RecognitionEvent::End => self.stop_listening(),
        }
    }

    fn stop_listening(&mut self) {
        if self.recognition.take().is_some() {
            self.events.emit(ChatEvent::VoiceChanged(VoiceState::Off));
        }
    }

    fn reject_voice(&self, error: VoiceError) -> VoiceToggle {
        tracing::info!(error = %error, "Voice capture unavailable");
        self.events
            .emit(ChatEvent::Notice(error.user_message().to_string()));
        VoiceToggle::Rejected(error)
    }

    fn append(&mut self, message: Message) {
        let event = ChatEvent::Appended(message.clone());
        if self.store.append(message).is_err() {
            self.events
                .emit(ChatEvent::Notice("Couldn't save chat history.".to_string()));
        }
        self.events.emit(event);
    }

    fn set_state(&mut self, state: LoadingState) {
        self.state = state;
        self.events.emit(ChatEvent::StateChanged(state));
    }
}
