//! Scripted recognizer for tests and demos.

use super::{RecognitionEvent, RecognitionSession, SpeechRecognizer, VoiceError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Recognizer that replays a fixed script of events per session.
///
/// Once the script runs out the session stays open until stopped.
#[derive(Clone)]
pub struct MockSpeechRecognizer {
    supported: bool,
    microphone_granted: bool,
    script: Arc<Mutex<Vec<RecognitionEvent>>>,
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
}

impl MockSpeechRecognizer {
    pub fn new(supported: bool, microphone_granted: bool) -> Self {
        Self {
            supported,
            microphone_granted,
            script: Arc::new(Mutex::new(Vec::new())),
            starts: Arc::new(AtomicUsize::new(0)),
            stops: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Recognizer that hears `transcript` and then ends the session.
    pub fn hearing(transcript: impl Into<String>) -> Self {
        Self::new(true, true).with_script(vec![
            RecognitionEvent::Result(transcript.into()),
            RecognitionEvent::End,
        ])
    }

    pub fn with_script(self, script: Vec<RecognitionEvent>) -> Self {
        if let Ok(mut current) = self.script.lock() {
            *current = script;
        }
        self
    }

    /// Sessions started so far.
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Sessions stopped so far.
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechRecognizer for MockSpeechRecognizer {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn request_microphone(&self) -> Result<(), VoiceError> {
        if self.microphone_granted {
            Ok(())
        } else {
            Err(VoiceError::PermissionDenied)
        }
    }

    fn start(&self) -> Result<Box<dyn RecognitionSession>, VoiceError> {
        if !self.supported {
            return Err(VoiceError::Unsupported);
        }

        let script = self
            .script
            .lock()
            .map(|s| s.clone())
            .map_err(|_| VoiceError::Recognition("script poisoned".to_string()))?;

        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            events: script.into(),
            stopped: false,
            stops: self.stops.clone(),
        }))
    }
}

struct MockSession {
    events: VecDeque<RecognitionEvent>,
    stopped: bool,
    stops: Arc<AtomicUsize>,
}

#[async_trait]
impl RecognitionSession for MockSession {
    async fn next_event(&mut self) -> RecognitionEvent {
        if self.stopped {
            return RecognitionEvent::End;
        }
        match self.events.pop_front() {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}
