//! In-memory conversation store.

use crate::conversation::{Conversation, ConversationPatch};
use crate::messages::ConversationId;

use super::{ConversationStore, StoreError};

/// Volatile store; also the mirror behind [`super::JsonFileStore`]
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    conversations: Vec<Conversation>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given conversations
    #[must_use]
    pub fn from_conversations(conversations: Vec<Conversation>) -> Self {
        Self { conversations }
    }

    /// Number of stored conversations
    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Borrow the stored conversations in insertion order (newest inserted first)
    pub(crate) fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    fn position(&self, id: &ConversationId) -> Option<usize> {
        self.conversations.iter().position(|c| &c.id == id)
    }
}

impl ConversationStore for MemoryStore {
    fn get(&self, id: &ConversationId) -> Result<Option<Conversation>, StoreError> {
        Ok(self.position(id).map(|i| self.conversations[i].clone()))
    }

    fn set(
        &mut self,
        id: &ConversationId,
        patch: ConversationPatch,
    ) -> Result<Conversation, StoreError> {
        let index = self
            .position(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let conversation = &mut self.conversations[index];
        conversation.apply(patch);
        Ok(conversation.clone())
    }

    fn insert(&mut self, conversation: Conversation) -> Result<(), StoreError> {
        if self.position(&conversation.id).is_some() {
            return Err(StoreError::Duplicate(conversation.id));
        }
        self.conversations.insert(0, conversation);
        Ok(())
    }

    fn delete(&mut self, id: &ConversationId) -> Result<bool, StoreError> {
        Ok(match self.position(id) {
            Some(index) => {
                self.conversations.remove(index);
                true
            }
            None => false,
        })
    }

    fn list_all(&self) -> Result<Vec<Conversation>, StoreError> {
        let mut all = self.conversations.clone();
        // Stable: equal timestamps keep insertion order
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}
