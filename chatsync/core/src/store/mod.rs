//! Persistence Boundary
//!
//! The store exclusively owns durable conversation data. The sync engine
//! reads and writes through [`ConversationStore`] only; nothing else in the
//! core touches the filesystem.

mod json_file;
mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use thiserror::Error;

use crate::conversation::{Conversation, ConversationPatch};
use crate::messages::ConversationId;

/// Persistence failures
#[derive(Debug, Error)]
pub enum StoreError {
    /// No conversation with this ID
    #[error("Conversation not found: {0}")]
    NotFound(ConversationId),

    /// A conversation with this ID already exists
    #[error("Conversation already exists: {0}")]
    Duplicate(ConversationId),

    /// Filesystem failure
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding failure
    #[error("Storage encoding error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Conversation persistence contract
///
/// Writes are synchronous: when a call returns `Ok`, the change is visible to
/// every later read.
pub trait ConversationStore: Send {
    /// Read one conversation
    fn get(&self, id: &ConversationId) -> Result<Option<Conversation>, StoreError>;

    /// Apply a partial update and return the stored result
    fn set(
        &mut self,
        id: &ConversationId,
        patch: ConversationPatch,
    ) -> Result<Conversation, StoreError>;

    /// Add a new conversation
    fn insert(&mut self, conversation: Conversation) -> Result<(), StoreError>;

    /// Delete a conversation; returns whether it existed
    fn delete(&mut self, id: &ConversationId) -> Result<bool, StoreError>;

    /// All conversations, newest first
    fn list_all(&self) -> Result<Vec<Conversation>, StoreError>;

    /// The newest conversation, if any
    fn most_recent(&self) -> Result<Option<Conversation>, StoreError> {
        Ok(self.list_all()?.into_iter().next())
    }
}
