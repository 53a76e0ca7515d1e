//! Sync Messages
//!
//! Messages sent from the sync engine to whatever surface renders the chat
//! (terminal, web view, test harness). They are the engine's only outward
//! effect besides store writes.
//!
//! # Design Philosophy
//!
//! Surfaces are renderers. They do not decide when a conversation is
//! persisted, titled, or marked as streaming; they redraw whatever the engine
//! reports here.

use serde::{Deserialize, Serialize};

use crate::conversation::{Conversation, ConversationSummary};

/// Messages from the engine to a surface
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SyncMessage {
    // ============================================
    // Conversation Messages
    // ============================================
    /// The active conversation changed (or was reseeded from the store)
    ActiveConversation {
        /// The now-active conversation, `None` when nothing is selected
        conversation: Option<Conversation>,
    },

    /// A write reached the persistence boundary
    ConversationCommitted {
        /// The conversation as stored after the write
        conversation: Conversation,
    },

    /// Recency-ordered listing of stored conversations
    ConversationList {
        /// Newest first
        entries: Vec<ConversationSummary>,
    },

    /// Put rejected or failed input back into the composer
    RestoreInput {
        /// The text the user submitted
        content: String,
    },

    // ============================================
    // System Messages
    // ============================================
    /// User-facing notification
    Notify {
        /// Notification level
        level: NotifyLevel,
        /// Title (optional)
        title: Option<String>,
        /// Message content
        message: String,
    },

    /// Engine state change
    State {
        /// The new state
        state: SyncState,
    },

    /// Request surface to quit
    Quit {
        /// Optional goodbye message
        message: Option<String>,
    },
}

/// Conversation identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// Generate a new unique conversation ID
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Message identifier, unique within a conversation
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique message ID
    #[must_use]
    pub fn new() -> Self {
        Self(format!("msg_{}", uuid::Uuid::new_v4().simple()))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User input
    User,
    /// Model response
    Assistant,
}

impl MessageRole {
    /// Wire name used by chat-completion APIs
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Notification levels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyLevel {
    /// Informational
    Info,
    /// Warning
    Warning,
    /// Error
    Error,
    /// Success
    Success,
}

/// Engine operational states
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    /// Loading stored conversations
    Initializing,
    /// Ready for input
    Ready,
    /// Request issued, waiting for the first token
    Submitting,
    /// Tokens are arriving
    Streaming,
    /// Shutting down
    ShuttingDown,
}

impl SyncState {
    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Initializing => "Starting up...",
            Self::Ready => "Ready",
            Self::Submitting => "Thinking...",
            Self::Streaming => "Responding...",
            Self::ShuttingDown => "Shutting down...",
        }
    }

    /// Whether a response is in flight
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Submitting | Self::Streaming)
    }
}
