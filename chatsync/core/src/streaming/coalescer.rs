//! Update Coalescer
//!
//! Rate-limits streaming commits. Token snapshots can arrive hundreds of
//! times a second; persisting each one would rewrite the store far more often
//! than any surface can redraw. The coalescer holds the newest streaming
//! update and releases it once per window, while structural updates go
//! straight through.
//!
//! The throttle is trailing and the deadline does not move: the first
//! streaming update of a window arms it, later ones only replace the pending
//! value. A steady token stream therefore commits at a steady rate instead
//! of being postponed until it pauses.

use std::time::Duration;

use tokio::time::Instant;

/// Default coalescing window
pub const DEFAULT_COALESCE_WINDOW: Duration = Duration::from_millis(50);

/// How an offered update should be committed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitClass {
    /// Commit synchronously
    Immediate,
    /// Commit through the window
    Streaming,
}

/// Holds at most one pending streaming update
#[derive(Clone, Debug)]
pub struct UpdateCoalescer<T> {
    window: Duration,
    pending: Option<T>,
    deadline: Option<Instant>,
}

impl<T> Default for UpdateCoalescer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_COALESCE_WINDOW)
    }
}

impl<T> UpdateCoalescer<T> {
    /// Create a coalescer with the given window
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            deadline: None,
        }
    }

    /// Offer an update.
    ///
    /// Returns the update to commit right now, if any. An immediate update
    /// supersedes whatever was pending.
    pub fn offer(&mut self, update: T, class: CommitClass, now: Instant) -> Option<T> {
        match class {
            CommitClass::Immediate => {
                if self.pending.take().is_some() {
                    tracing::trace!("Pending streaming update superseded");
                }
                self.deadline = None;
                Some(update)
            }
            CommitClass::Streaming => {
                self.pending = Some(update);
                if self.deadline.is_none() {
                    self.deadline = Some(now + self.window);
                }
                None
            }
        }
    }

    /// Take the pending update if its deadline has passed
    pub fn poll_due(&mut self, now: Instant) -> Option<T> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.flush(),
            _ => None,
        }
    }

    /// Take the pending update regardless of the deadline
    pub fn flush(&mut self) -> Option<T> {
        self.deadline = None;
        self.pending.take()
    }

    /// When the pending update becomes due
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether an update is waiting
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The configured window
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }
}
