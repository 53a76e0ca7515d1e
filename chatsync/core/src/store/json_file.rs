//! JSON File Store
//!
//! Conversations persisted as one JSON array in a single file, mirrored in a
//! [`MemoryStore`]. Every mutation rewrites the whole file atomically: the
//! array is written to a sibling temp file, synced, then renamed over the
//! target. Removing the last conversation removes the file.
//!
//! Loading is forgiving. A file that cannot be read or parsed is logged,
//! deleted and replaced by an empty store; conversations naming a model the
//! registry no longer supports are moved to the default model.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::conversation::{Conversation, ConversationPatch};
use crate::messages::ConversationId;
use crate::registry::ModelRegistry;

use super::{ConversationStore, MemoryStore, StoreError};

/// File-backed conversation store
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    mirror: MemoryStore,
}

impl JsonFileStore {
    /// Open (or start) the store at `path`
    #[must_use]
    pub fn open(path: impl Into<PathBuf>, registry: &ModelRegistry) -> Self {
        let path = path.into();
        let conversations = match Self::load(&path) {
            Ok(conversations) => conversations,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Discarding unreadable conversation file");
                if let Err(e) = fs::remove_file(&path) {
                    tracing::error!(path = %path.display(), error = %e, "Failed to remove conversation file");
                }
                Vec::new()
            }
        };

        let conversations = conversations
            .into_iter()
            .map(|mut conversation| {
                if !registry.contains(&conversation.model) {
                    tracing::info!(
                        conversation = %conversation.id,
                        from = %conversation.model,
                        to = registry.default_model(),
                        "Migrating conversation to supported model"
                    );
                    conversation.model = registry.default_model().to_string();
                }
                conversation.is_streaming = false;
                conversation
            })
            .collect::<Vec<_>>();

        tracing::debug!(path = %path.display(), count = conversations.len(), "Opened conversation store");

        Self {
            path,
            mirror: MemoryStore::from_conversations(conversations),
        }
    }

    /// Default location: `$XDG_DATA_HOME/chatsync/conversations.json`
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chatsync")
            .join("conversations.json")
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<Vec<Conversation>, StoreError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_str(&content)?)
    }

    /// Apply a change to the mirror and persist it.
    ///
    /// The mirror is restored if the write fails, so memory never holds a
    /// change the file does not.
    fn write_through<T>(
        &mut self,
        change: impl FnOnce(&mut MemoryStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let previous = self.mirror.clone();
        let result = change(&mut self.mirror)?;
        if let Err(e) = self.persist() {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to write conversation file");
            self.mirror = previous;
            return Err(e);
        }
        Ok(result)
    }

    /// Rewrite the backing file from the mirror
    fn persist(&self) -> Result<(), StoreError> {
        let conversations = self.mirror.conversations();

        if conversations.is_empty() {
            return match fs::remove_file(&self.path) {
                Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_vec_pretty(conversations)?;
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }
}

impl ConversationStore for JsonFileStore {
    fn get(&self, id: &ConversationId) -> Result<Option<Conversation>, StoreError> {
        self.mirror.get(id)
    }

    fn set(
        &mut self,
        id: &ConversationId,
        patch: ConversationPatch,
    ) -> Result<Conversation, StoreError> {
        self.write_through(|mirror| mirror.set(id, patch))
    }

    fn insert(&mut self, conversation: Conversation) -> Result<(), StoreError> {
        self.write_through(|mirror| mirror.insert(conversation))
    }

    fn delete(&mut self, id: &ConversationId) -> Result<bool, StoreError> {
        if self.mirror.get(id)?.is_none() {
            return Ok(false);
        }
        self.write_through(|mirror| mirror.delete(id))
    }

    fn list_all(&self) -> Result<Vec<Conversation>, StoreError> {
        self.mirror.list_all()
    }
}
