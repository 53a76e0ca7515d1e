//! Conversation Switch Handler
//!
//! Tracks which conversation is active and owns its live stream. A switch
//! cancels the stream and bumps the epoch, so anything the old stream already
//! queued is recognisably stale when it reaches the engine, including after
//! switching away and straight back (A to B to A).

use crate::messages::ConversationId;
use crate::streaming::{StreamHandle, StreamTicket};

/// Switcher state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SwitchState {
    /// No conversation selected
    #[default]
    Detached,
    /// A conversation is active
    Idle(ConversationId),
    /// Between [`ConversationSwitcher::begin`] and [`ConversationSwitcher::finish`]
    Switching {
        /// Previously active conversation
        from: Option<ConversationId>,
        /// Conversation being activated
        to: Option<ConversationId>,
    },
}

/// A switch in progress
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    /// Previously active conversation
    pub from: Option<ConversationId>,
    /// Conversation being activated
    pub to: Option<ConversationId>,
    /// The stream cancelled by this switch, if one was live
    pub cancelled: Option<StreamTicket>,
}

/// Owns the mapping from the active conversation to its live stream
#[derive(Debug, Default)]
pub struct ConversationSwitcher {
    state: SwitchState,
    epoch: u64,
    live: Option<StreamHandle>,
}

impl ConversationSwitcher {
    /// Create a detached switcher
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> &SwitchState {
        &self.state
    }

    /// Current epoch
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The active conversation (the target while a switch is in progress)
    #[must_use]
    pub fn active(&self) -> Option<&ConversationId> {
        match &self.state {
            SwitchState::Detached => None,
            SwitchState::Idle(id) => Some(id),
            SwitchState::Switching { to, .. } => to.as_ref(),
        }
    }

    /// Start switching to `target`.
    ///
    /// Returns `None` when `target` is already active. Otherwise cancels the
    /// live stream, bumps the epoch and enters [`SwitchState::Switching`].
    pub fn begin(&mut self, target: Option<ConversationId>) -> Option<Transition> {
        let from = self.active().cloned();
        if from == target && matches!(self.state, SwitchState::Idle(_) | SwitchState::Detached) {
            return None;
        }

        let cancelled = self.cancel_stream();
        self.epoch += 1;
        tracing::debug!(from = ?from, to = ?target, epoch = self.epoch, "Switching conversation");

        self.state = SwitchState::Switching {
            from: from.clone(),
            to: target.clone(),
        };

        Some(Transition {
            from,
            to: target,
            cancelled,
        })
    }

    /// Complete a switch started with [`Self::begin`]
    pub fn finish(&mut self) {
        if let SwitchState::Switching { to, .. } = &self.state {
            self.state = match to {
                Some(id) => SwitchState::Idle(id.clone()),
                None => SwitchState::Detached,
            };
        }
    }

    /// Ticket for a stream started on the active conversation now
    #[must_use]
    pub fn ticket(&self) -> Option<StreamTicket> {
        match &self.state {
            SwitchState::Idle(id) => Some(StreamTicket {
                conversation_id: id.clone(),
                epoch: self.epoch,
            }),
            _ => None,
        }
    }

    /// Whether an update with this ticket belongs to the live session
    #[must_use]
    pub fn is_current(&self, ticket: &StreamTicket) -> bool {
        match &self.state {
            SwitchState::Idle(id) => {
                id == &ticket.conversation_id && self.epoch == ticket.epoch
            }
            _ => false,
        }
    }

    /// Take ownership of a started stream
    pub fn attach(&mut self, handle: StreamHandle) {
        if let Some(previous) = self.live.replace(handle) {
            previous.cancel();
        }
    }

    /// Release the live stream after it reached a terminal update
    pub fn release(&mut self) {
        self.live = None;
    }

    /// Cancel the live stream, returning its ticket
    pub fn cancel_stream(&mut self) -> Option<StreamTicket> {
        self.live.take().map(|handle| {
            handle.cancel();
            handle.ticket().clone()
        })
    }

    /// Whether a stream is attached
    #[must_use]
    pub fn has_live_stream(&self) -> bool {
        self.live.is_some()
    }
}
