//! Sync Events
//!
//! Everything that can change engine state arrives as a [`SyncEvent`] on one
//! channel: user actions forwarded by a surface, and updates from running
//! stream sources.
//!
//! # Design Philosophy
//!
//! Surfaces report what the user did; they don't interpret it. Whether a
//! submit is accepted, which conversation becomes active after a delete, and
//! when a streamed reply is persisted are all decided by the engine.

use crate::messages::ConversationId;
use crate::streaming::SourceUpdate;

/// Events into the sync engine
#[derive(Clone, Debug)]
pub enum SyncEvent {
    // ============================================
    // User Input Events
    // ============================================
    /// User submitted a message to the active conversation
    UserMessage {
        /// The message content, as typed
        content: String,
    },

    // ============================================
    // Conversation Management Events
    // ============================================
    /// Make a conversation active
    SelectConversation {
        /// Conversation to activate
        id: ConversationId,
    },

    /// Create an empty conversation and make it active
    NewConversation,

    /// Delete a conversation
    DeleteConversation {
        /// Conversation to delete
        id: ConversationId,
    },

    /// Set a conversation's title
    RenameConversation {
        /// Conversation to rename
        id: ConversationId,
        /// New title
        title: String,
    },

    /// Change the active conversation's model
    ChangeModel {
        /// Registry model identifier
        model: String,
    },

    /// Request a listing of stored conversations
    ListConversations,

    // ============================================
    // Stream Events
    // ============================================
    /// Update from a running stream source
    Stream(SourceUpdate),

    // ============================================
    // Lifecycle Events
    // ============================================
    /// Timer tick; commits a coalesced update if it is due
    Tick,

    /// Flush pending work and stop
    Shutdown,
}

impl SyncEvent {
    /// Whether the event came from a user action
    #[must_use]
    pub fn is_user_action(&self) -> bool {
        !matches!(self, Self::Stream(_) | Self::Tick | Self::Shutdown)
    }
}
