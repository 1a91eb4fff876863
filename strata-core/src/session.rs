//! Chat session and message entities.
//!
//! Sessions are produced by an external persistence provider and consumed by
//! the search and export crates. The one invariant relied upon downstream is
//! chronological message order; consumers sort defensively before deriving
//! response-time statistics rather than trusting the stored order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub text: String,
    /// Display name of the author.
    pub sender: String,
    /// True when the message was produced by the assistant side.
    pub from_assistant: bool,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a message timestamped now.
    pub fn new(text: impl Into<String>, sender: impl Into<String>, from_assistant: bool) -> Self {
        Self {
            id: Uuid::now_v7(),
            text: text.into(),
            sender: sender.into(),
            from_assistant,
            timestamp: Utc::now(),
        }
    }

    /// Set an explicit timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A chat session: a stable id, a title, and an ordered message list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// Create an empty session.
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            title: title.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message and bump the updated timestamp.
    pub fn push(&mut self, message: ChatMessage) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    /// Messages sorted chronologically, oldest first.
    ///
    /// Stored order is usually already chronological; this is the defensive
    /// sort consumers apply before deriving time-based statistics.
    pub fn sorted_messages(&self) -> Vec<ChatMessage> {
        let mut sorted = self.messages.clone();
        sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        sorted
    }
}
