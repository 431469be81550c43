//! Voice capture tests against the scripted recognizer.

mod common;

use chat_client::controller::{ChatEvent, VoiceState, VoiceToggle};
use chat_client::services::speech::mock::MockSpeechRecognizer;
use chat_client::services::speech::{RecognitionEvent, VoiceError};
use common::{ScriptedProvider, TestChat};
use std::time::Duration;

fn notices(events: Vec<ChatEvent>) -> Vec<String> {
    events
        .into_iter()
        .filter_map(|e| match e {
            ChatEvent::Notice(text) => Some(text),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn unsupported_device_stays_off_with_a_notice() {
    let recognizer = MockSpeechRecognizer::new(false, true);
    let mut chat = TestChat::with_recognizer(ScriptedProvider::new(), recognizer);

    let toggle = chat.controller.toggle_voice().await;

    assert_eq!(toggle, VoiceToggle::Rejected(VoiceError::Unsupported));
    assert_eq!(chat.controller.voice_state(), VoiceState::Off);
    assert!(chat.controller.messages().is_empty());
    assert_eq!(chat.recognizer.starts(), 0);
    assert_eq!(
        notices(chat.drain_events()),
        vec!["Voice input isn't supported on this device.".to_string()]
    );
}

#[tokio::test]
async fn denied_microphone_stays_off_with_a_notice() {
    let recognizer = MockSpeechRecognizer::new(true, false);
    let mut chat = TestChat::with_recognizer(ScriptedProvider::new(), recognizer);

    let toggle = chat.controller.toggle_voice().await;

    assert_eq!(toggle, VoiceToggle::Rejected(VoiceError::PermissionDenied));
    assert_eq!(chat.controller.voice_state(), VoiceState::Off);
    assert_eq!(chat.recognizer.starts(), 0);
    assert_eq!(
        notices(chat.drain_events()),
        vec!["Please allow microphone access to use voice input.".to_string()]
    );
}

#[tokio::test]
async fn transcript_is_appended_to_the_input_with_a_space() {
    let recognizer = MockSpeechRecognizer::hearing("center a div");
    let mut chat = TestChat::with_recognizer(ScriptedProvider::new(), recognizer);
    chat.controller.set_input("How do I");

    assert_eq!(chat.controller.toggle_voice().await, VoiceToggle::Started);
    assert_eq!(chat.controller.voice_state(), VoiceState::Listening);

    let event = chat.controller.next_voice_event().await;
    assert_eq!(event, RecognitionEvent::Result("center a div".to_string()));
    chat.controller.apply_voice_event(event);
    assert_eq!(chat.controller.input(), "How do I center a div");

    let event = chat.controller.next_voice_event().await;
    chat.controller.apply_voice_event(event);

    assert_eq!(chat.controller.voice_state(), VoiceState::Off);
    assert_eq!(chat.recognizer.starts(), 1);
    assert_eq!(chat.recognizer.stops(), 1);
    assert!(chat.controller.messages().is_empty());
}

#[tokio::test]
async fn transcript_fills_an_empty_input_without_padding() {
    let recognizer = MockSpeechRecognizer::hearing("what is a trait");
    let mut chat = TestChat::with_recognizer(ScriptedProvider::new(), recognizer);

    chat.controller.toggle_voice().await;
    let event = chat.controller.next_voice_event().await;
    chat.controller.apply_voice_event(event);

    assert_eq!(chat.controller.input(), "what is a trait");
}

#[tokio::test]
async fn toggling_again_stops_listening() {
    let recognizer = MockSpeechRecognizer::new(true, true);
    let mut chat = TestChat::with_recognizer(ScriptedProvider::new(), recognizer);

    assert_eq!(chat.controller.toggle_voice().await, VoiceToggle::Started);
    assert_eq!(chat.controller.toggle_voice().await, VoiceToggle::Stopped);

    assert_eq!(chat.controller.voice_state(), VoiceState::Off);
    assert_eq!(chat.recognizer.stops(), 1);
    let events = chat.drain_events();
    assert!(events.contains(&ChatEvent::VoiceChanged(VoiceState::Listening)));
    assert!(events.contains(&ChatEvent::VoiceChanged(VoiceState::Off)));
}

#[tokio::test]
async fn recognition_error_ends_listening() {
    let recognizer = MockSpeechRecognizer::new(true, true)
        .with_script(vec![RecognitionEvent::Error("network".to_string())]);
    let mut chat = TestChat::with_recognizer(ScriptedProvider::new(), recognizer);
    chat.controller.set_input("keep this");

    chat.controller.toggle_voice().await;
    let event = chat.controller.next_voice_event().await;
    chat.controller.apply_voice_event(event);

    assert_eq!(chat.controller.voice_state(), VoiceState::Off);
    assert_eq!(chat.controller.input(), "keep this");
    assert_eq!(chat.recognizer.stops(), 1);
}

#[tokio::test]
async fn no_voice_events_while_off() {
    let mut chat = TestChat::spawn(ScriptedProvider::new());

    let waited =
        tokio::time::timeout(Duration::from_millis(20), chat.controller.next_voice_event()).await;

    assert!(waited.is_err());
}

#[tokio::test]
async fn dropping_the_controller_releases_the_microphone() {
    let recognizer = MockSpeechRecognizer::new(true, true);
    let mut chat = TestChat::with_recognizer(ScriptedProvider::new(), recognizer.clone());
    chat.controller.toggle_voice().await;
    assert_eq!(recognizer.stops(), 0);

    drop(chat);

    assert_eq!(recognizer.starts(), 1);
    assert_eq!(recognizer.stops(), 1);
}

#[tokio::test]
async fn spoken_question_can_be_submitted() {
    let recognizer = MockSpeechRecognizer::hearing("explain iterators");
    let provider = ScriptedProvider::answering("Iterators yield items lazily.", Vec::new());
    let mut chat = TestChat::with_recognizer(provider, recognizer);

    chat.controller.toggle_voice().await;
    let event = chat.controller.next_voice_event().await;
    chat.controller.apply_voice_event(event);
    chat.controller.submit().await;

    let contents: Vec<_> = chat
        .controller
        .messages()
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["explain iterators", "Iterators yield items lazily."]);
}
