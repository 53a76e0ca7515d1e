//! Conversation Model
//!
//! Conversations, their messages, and the partial-update type used to write
//! them through the persistence boundary.
//!
//! A conversation's message list is append-only while it is live. Messages are
//! never reordered or removed individually; only deleting the whole
//! conversation drops them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::messages::{ConversationId, MessageId, MessageRole};
use crate::title::NEW_CHAT_TITLE;

/// A message in a conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message ID
    pub id: MessageId,
    /// Who sent this message
    pub role: MessageRole,
    /// Message content
    pub content: String,
    /// When the message was first committed
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a new message
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Length used for growth detection (bytes; content only ever grows by appending)
    #[must_use]
    pub fn content_len(&self) -> usize {
        self.content.len()
    }
}

/// A stored conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,
    /// Display title, "New Chat" until derived
    pub title: String,
    /// Chronological message history
    pub messages: Vec<ChatMessage>,
    /// Selected model identifier
    pub model: String,
    /// When the conversation was created
    pub created_at: DateTime<Utc>,
    /// Whether a response is streaming into this conversation.
    ///
    /// Derived from live stream state; never trusted when read back from disk.
    #[serde(default)]
    pub is_streaming: bool,
}

impl Conversation {
    /// Create an empty, untitled conversation
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_id(ConversationId::new(), model)
    }

    /// Create a conversation with a specific ID
    pub fn with_id(id: ConversationId, model: impl Into<String>) -> Self {
        Self {
            id,
            title: NEW_CHAT_TITLE.to_string(),
            messages: Vec::new(),
            model: model.into(),
            created_at: Utc::now(),
            is_streaming: false,
        }
    }

    /// Apply a partial update.
    ///
    /// Message timestamps are assigned once: a message that was already
    /// stored keeps its original timestamp when the list is replaced.
    pub fn apply(&mut self, patch: ConversationPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(model) = patch.model {
            self.model = model;
        }
        if let Some(is_streaming) = patch.is_streaming {
            self.is_streaming = is_streaming;
        }
        if let Some(mut messages) = patch.messages {
            let committed: HashMap<&MessageId, DateTime<Utc>> = self
                .messages
                .iter()
                .map(|m| (&m.id, m.timestamp))
                .collect();
            for msg in &mut messages {
                if let Some(ts) = committed.get(&msg.id) {
                    msg.timestamp = *ts;
                }
            }
            self.messages = messages;
        }
    }

    /// The most recent message
    #[must_use]
    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Listing entry for this conversation
    #[must_use]
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            model: self.model.clone(),
            message_count: self.messages.len(),
            is_streaming: self.is_streaming,
            created_at: self.created_at,
        }
    }
}

/// Partial conversation fields for a store write; `None` leaves a field as is
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversationPatch {
    /// New title
    pub title: Option<String>,
    /// Full replacement of the message list
    pub messages: Option<Vec<ChatMessage>>,
    /// New model identifier
    pub model: Option<String>,
    /// New streaming flag
    pub is_streaming: Option<bool>,
}

impl ConversationPatch {
    /// Empty patch
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Replace messages
    #[must_use]
    pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = Some(messages);
        self
    }

    /// Set model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set streaming flag
    #[must_use]
    pub fn with_streaming(mut self, is_streaming: bool) -> Self {
        self.is_streaming = Some(is_streaming);
        self
    }

    /// Whether the patch changes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.messages.is_none()
            && self.model.is_none()
            && self.is_streaming.is_none()
    }
}

/// Listing entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation ID
    pub id: ConversationId,
    /// Display title
    pub title: String,
    /// Selected model
    pub model: String,
    /// Number of stored messages
    pub message_count: usize,
    /// Whether a response is streaming
    pub is_streaming: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_conversation_creation() {
        let conv = Conversation::new("gpt-4o");
        assert_eq!(conv.title, "New Chat");
        assert!(conv.messages.is_empty());
        assert_eq!(conv.model, "gpt-4o");
        assert!(!conv.is_streaming);
    }

    #[test]
    fn test_apply_patch_fields() {
        let mut conv = Conversation::new("gpt-4o");
        conv.apply(
            ConversationPatch::new()
                .with_title("Rust lifetimes")
                .with_model("gpt-4o-mini")
                .with_streaming(true),
        );
        assert_eq!(conv.title, "Rust lifetimes");
        assert_eq!(conv.model, "gpt-4o-mini");
        assert!(conv.is_streaming);
        assert!(conv.messages.is_empty());
    }

    #[test]
    fn test_apply_preserves_committed_timestamps() {
        let mut conv = Conversation::new("gpt-4o");
        let first = ChatMessage::user("Hello");
        let original_ts = first.timestamp;
        conv.apply(ConversationPatch::new().with_messages(vec![first.clone()]));

        let mut restamped = first.clone();
        restamped.timestamp = original_ts + chrono::Duration::seconds(30);
        let reply = ChatMessage::new(MessageRole::Assistant, "Hi");
        conv.apply(ConversationPatch::new().with_messages(vec![restamped, reply.clone()]));

        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[0].timestamp, original_ts);
        assert_eq!(conv.messages[1].timestamp, reply.timestamp);
    }

    #[test]
    fn test_empty_patch() {
        assert!(ConversationPatch::new().is_empty());
        assert!(!ConversationPatch::new().with_streaming(false).is_empty());
    }

    #[test]
    fn test_summary() {
        let mut conv = Conversation::new("gpt-4o");
        conv.messages.push(ChatMessage::user("Hi"));
        let summary = conv.summary();
        assert_eq!(summary.id, conv.id);
        assert_eq!(summary.message_count, 1);
        assert_eq!(summary.title, "New Chat");
    }

    #[test]
    fn test_is_streaming_defaults_when_missing() {
        let conv = Conversation::new("gpt-4o");
        let mut value = serde_json::to_value(&conv).unwrap();
        value.as_object_mut().unwrap().remove("is_streaming");
        let parsed: Conversation = serde_json::from_value(value).unwrap();
        assert!(!parsed.is_streaming);
    }
}
