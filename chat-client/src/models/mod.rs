//! Domain models for the chat client.

pub mod answer;
pub mod message;

pub use answer::Answer;
pub use message::{Message, Role, Source};
