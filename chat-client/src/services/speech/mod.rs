//! Speech-to-text capture used to fill the input buffer.
//!
//! Recognition is single-utterance: a session delivers at most one result
//! and then ends. The host platform supplies the implementation; a
//! terminal has none, so [`UnsupportedRecognizer`] is the default.

pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoiceError {
    #[error("Speech recognition not supported")]
    Unsupported,

    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Recognition failed: {0}")]
    Recognition(String),
}

impl VoiceError {
    /// The notice shown to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            VoiceError::Unsupported => "Voice input isn't supported on this device.",
            VoiceError::PermissionDenied => "Please allow microphone access to use voice input.",
            VoiceError::Recognition(_) => "Voice input stopped unexpectedly.",
        }
    }
}

/// Something a running recognition session reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// A final transcript of what was said.
    Result(String),

    /// Recognition failed; the session is over.
    Error(String),

    /// The session finished.
    End,
}

/// Platform speech recognition.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Whether this platform can recognize speech at all.
    fn is_supported(&self) -> bool;

    /// Ask for microphone access.
    async fn request_microphone(&self) -> Result<(), VoiceError>;

    /// Start a single-utterance session.
    fn start(&self) -> Result<Box<dyn RecognitionSession>, VoiceError>;
}

/// A running recognition session.
#[async_trait]
pub trait RecognitionSession: Send {
    /// Wait for the next event. Pends until something happens.
    async fn next_event(&mut self) -> RecognitionEvent;

    /// Stop capturing. Calling it more than once is harmless.
    fn stop(&mut self);
}

/// Recognizer for platforms without speech support.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedRecognizer;

#[async_trait]
impl SpeechRecognizer for UnsupportedRecognizer {
    fn is_supported(&self) -> bool {
        false
    }

    async fn request_microphone(&self) -> Result<(), VoiceError> {
        Err(VoiceError::Unsupported)
    }

    fn start(&self) -> Result<Box<dyn RecognitionSession>, VoiceError> {
        Err(VoiceError::Unsupported)
    }
}
