//! Change detection between successive stream snapshots.

use crate::conversation::ChatMessage;

/// What the detector remembers about the last applied snapshot
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateSnapshot {
    /// Number of messages
    pub message_count: usize,
    /// Whether a response was in flight
    pub loading: bool,
    /// Content length of the last message in bytes
    pub last_content_len: usize,
}

impl UpdateSnapshot {
    /// Capture a message list and loading flag
    #[must_use]
    pub fn capture(messages: &[ChatMessage], loading: bool) -> Self {
        Self {
            message_count: messages.len(),
            loading,
            last_content_len: messages.last().map_or(0, ChatMessage::content_len),
        }
    }
}

/// Classification of an observed snapshot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Detection {
    /// Structural change (message added or loading toggled); commit now
    Immediate,
    /// The last message grew; commit through the coalescer
    Streaming,
    /// Nothing changed
    Unchanged,
    /// The last message got shorter; not applied
    Shrunk {
        /// Previously observed length
        previous: usize,
        /// Length in the rejected snapshot
        current: usize,
    },
}

impl Detection {
    /// Whether the snapshot should be committed at all
    #[must_use]
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Immediate | Self::Streaming)
    }
}

/// Decides whether a snapshot is a meaningful change and how urgent it is.
///
/// Precedence: message count, then loading flag, then growth of the last
/// message. A snapshot classified [`Detection::Unchanged`] or
/// [`Detection::Shrunk`] leaves the tracked state as it was, so repeating a
/// snapshot never re-emits a change.
#[derive(Clone, Debug, Default)]
pub struct ChangeDetector {
    snapshot: UpdateSnapshot,
}

impl ChangeDetector {
    /// Create a detector at the zero snapshot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a snapshot and track it if it is a change
    pub fn observe(&mut self, messages: &[ChatMessage], loading: bool) -> Detection {
        let current = UpdateSnapshot::capture(messages, loading);
        let previous = self.snapshot;

        let detection = if current.message_count != previous.message_count
            || current.loading != previous.loading
        {
            Detection::Immediate
        } else if current.last_content_len > previous.last_content_len {
            Detection::Streaming
        } else if current.last_content_len < previous.last_content_len {
            Detection::Shrunk {
                previous: previous.last_content_len,
                current: current.last_content_len,
            }
        } else {
            Detection::Unchanged
        };

        match detection {
            Detection::Immediate | Detection::Streaming => self.snapshot = current,
            Detection::Shrunk { previous, current } => {
                tracing::warn!(previous, current, "Ignoring snapshot with shrinking content");
            }
            Detection::Unchanged => {}
        }

        detection
    }

    /// Track a known state without classifying it (after reseeding from the store)
    pub fn prime(&mut self, messages: &[ChatMessage], loading: bool) {
        self.snapshot = UpdateSnapshot::capture(messages, loading);
    }

    /// Return to the zero snapshot
    pub fn reset(&mut self) {
        self.snapshot = UpdateSnapshot::default();
    }

    /// The tracked snapshot
    #[must_use]
    pub fn snapshot(&self) -> UpdateSnapshot {
        self.snapshot
    }
}
