//! Plain-text rendering for the terminal client.

use crate::controller::{LoadingState, SUGGESTIONS};
use crate::models::{Message, Role};
use crate::services::dedupe;

pub const RECOVERY_TITLE: &str = "Something went wrong.";
pub const RECOVERY_HINT: &str = "Press Enter to reload.";

pub const HELP: &str = "\
Commands:
  /clear       start a new conversation
  /voice       start or stop voice input
  /suggest N   use starter question N
  /metrics     print collected metrics
  /quit        exit
End a line with \\ to keep typing on the next line.";

/// Prefix printed before a message body.
pub fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "you",
        Role::Model => "codebuddy",
    }
}

/// A complete message with its deduplicated sources underneath.
pub fn format_message(message: &Message) -> String {
    let mut out = format!("{}> {}", role_label(message.role), message.content);
    let sources = format_sources(message);
    if !sources.is_empty() {
        out.push('\n');
        out.push_str(&sources);
    }
    out
}

/// Source list for a model message, one line each, or an empty string.
pub fn format_sources(message: &Message) -> String {
    if message.role != Role::Model {
        return String::new();
    }
    dedupe(message.sources())
        .iter()
        .enumerate()
        .map(|(i, source)| match source.host() {
            Some(host) => format!("  [{}] {} ({})", i + 1, source.title, host),
            None => format!("  [{}] {}", i + 1, source.title),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// How to finish a streamed answer once the final message arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftEnding<'a> {
    /// The final text extends what was printed; print only this tail.
    Continue(&'a str),
    /// The final text differs (e.g. a failure notice); print it in full.
    Replace,
}

pub fn finish_draft<'a>(drafted: &str, content: &'a str) -> DraftEnding<'a> {
    match content.strip_prefix(drafted) {
        Some(rest) if !drafted.is_empty() => DraftEnding::Continue(rest),
        _ => DraftEnding::Replace,
    }
}

/// Greeting plus numbered starter questions, shown on an empty conversation.
pub fn format_welcome() -> String {
    let mut out = String::from("Ask me anything about code.\n");
    for (i, suggestion) in SUGGESTIONS.iter().enumerate() {
        out.push_str(&format!(
            "  {}. {}: {}\n",
            i + 1,
            suggestion.title,
            suggestion.query
        ));
    }
    out.push_str("Type /help for commands.");
    out
}

/// Status line under the conversation.
pub fn format_status(state: LoadingState, caption: Option<&str>, error: Option<&str>) -> Option<String> {
    match state {
        LoadingState::Idle => None,
        LoadingState::Loading => Some(format!("... {}", caption.unwrap_or("Thinking..."))),
        LoadingState::Error => error.map(|e| format!("! {}", e)),
    }
}

/// The recovery screen shown after the UI crashed.
pub fn format_recovery(detail: &str) -> String {
    format!("{}\n{}\n{}", RECOVERY_TITLE, detail, RECOVERY_HINT)
}

/// Parsed user input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Clear,
    Voice,
    Suggest(Option<usize>),
    Metrics,
    Help,
    Quit,
    /// Anything that is not a command is submitted as-is.
    Submit(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let mut parts = trimmed.split_whitespace();
        match parts.next() {
            Some("/clear") => Command::Clear,
            Some("/voice") => Command::Voice,
            // One-based on screen.
            Some("/suggest") => Command::Suggest(
                parts
                    .next()
                    .and_then(|n| n.parse::<usize>().ok())
                    .and_then(|n| n.checked_sub(1)),
            ),
            Some("/metrics") => Command::Metrics,
            Some("/help") => Command::Help,
            Some("/quit") | Some("/exit") => Command::Quit,
            _ => Command::Submit(line.to_string()),
        }
    }
}

/// Joins physical lines ending in `\` into one logical input.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffer: Vec<String>,
}

impl LineAssembler {
    /// Returns the logical line once it is complete.
    pub fn push(&mut self, line: &str) -> Option<String> {
        match line.strip_suffix('\\') {
            Some(head) => {
                self.buffer.push(head.to_string());
                None
            }
            None => {
                self.buffer.push(line.to_string());
                Some(std::mem::take(&mut self.buffer).join("\n"))
            }
        }
    }
}
