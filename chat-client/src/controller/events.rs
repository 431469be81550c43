//! Notifications the controller sends to whatever renders it.

use super::{LoadingState, VoiceState};
use crate::models::Message;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    StateChanged(LoadingState),

    /// Rotating status line shown while loading.
    Caption(&'static str),

    /// In-progress answer; replaced by the final message on completion.
    Draft(Message),

    Appended(Message),

    Cleared,

    /// Short user-facing notice, e.g. a voice capture problem.
    Notice(String),

    VoiceChanged(VoiceState),

    InputChanged(String),
}

/// Optional event sink. Sends after the receiver is gone are dropped.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventSink(Option<UnboundedSender<ChatEvent>>);

impl EventSink {
    pub(crate) fn new(tx: UnboundedSender<ChatEvent>) -> Self {
        Self(Some(tx))
    }

    pub(crate) fn emit(&self, event: ChatEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}
