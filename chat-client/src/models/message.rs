//! Chat message model.
//!
//! The persisted history is a JSON array of these records, so the field
//! names here are the on-disk format.

use chrono::{DateTime, SubsecRound, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// A web page the model cited while answering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub uri: String,
}

impl Source {
    pub fn new(title: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            uri: uri.into(),
        }
    }

    /// Host name shown next to the title, e.g. `developer.mozilla.org`.
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.uri)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }
}

/// One entry in the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Opaque unique identifier.
    pub id: String,

    pub role: Role,

    pub content: String,

    /// Cited sources, only ever present on model messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    /// Set on the transient draft shown while an answer streams in.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_pending: bool,
}

impl Message {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), None)
    }

    /// Create a model answer. An empty source list is stored as absent.
    pub fn model(content: impl Into<String>, sources: Vec<Source>) -> Self {
        let sources = if sources.is_empty() {
            None
        } else {
            Some(sources)
        };
        Self::new(Role::Model, content.into(), sources)
    }

    /// Create a model-role message carrying a failure text.
    pub fn model_error(content: impl Into<String>) -> Self {
        Self::new(Role::Model, content.into(), None)
    }

    /// Create the in-progress draft of a streaming answer.
    pub fn draft(content: impl Into<String>, sources: Vec<Source>) -> Self {
        let mut message = Self::model(content, sources);
        message.is_pending = true;
        message
    }

    fn new(role: Role, content: String, sources: Option<Vec<Source>>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            sources,
            // Stored as epoch milliseconds; keep the in-memory value identical.
            created_at: Utc::now().trunc_subsecs(3),
            is_pending: false,
        }
    }

    pub fn sources(&self) -> &[Source] {
        self.sources.as_deref().unwrap_or_default()
    }
}
