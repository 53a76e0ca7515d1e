//! Sync Engine
//!
//! The state container that ties the pipeline together. It owns the active
//! conversation's live message list and decides, for every incoming
//! [`SyncEvent`], what is written to the store and what surfaces are told.
//!
//! # Design Philosophy
//!
//! The engine is driven from exactly one task. Stream sources run elsewhere
//! and only ever send events back, so no state here is shared or locked. All
//! failures end up as [`SyncMessage::Notify`]; the session never stops
//! because a request, a write or a piece of input went wrong.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::backend::CompletionService;
use crate::config::SyncConfig;
use crate::conversation::{ChatMessage, Conversation, ConversationPatch};
use crate::error::SyncError;
use crate::events::SyncEvent;
use crate::messages::{ConversationId, MessageRole, NotifyLevel, SyncMessage, SyncState};
use crate::registry::ModelRegistry;
use crate::store::ConversationStore;
use crate::streaming::{
    ChangeDetector, CommitClass, Detection, MessageStreamSource, SourceUpdate, UpdateCoalescer,
};
use crate::switch::ConversationSwitcher;
use crate::title::derive_title;
use crate::validation::{ValidationResult, Validator};

/// Notice for a submit while a response is still streaming
pub const BUSY_MESSAGE: &str = "Please wait for the current response to finish.";

/// Capacity of the engine's event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A snapshot waiting to be written
#[derive(Clone, Debug, PartialEq)]
struct PendingCommit {
    conversation_id: ConversationId,
    messages: Vec<ChatMessage>,
    loading: bool,
}

/// Why the engine woke up
enum Wake {
    Event(Option<SyncEvent>),
    Deadline,
}

/// The sync engine
pub struct SyncEngine<B: CompletionService, S: ConversationStore> {
    /// Configuration
    config: SyncConfig,
    /// Completion backend
    backend: Arc<B>,
    /// Persistence boundary
    store: S,
    /// Supported models
    registry: ModelRegistry,
    /// Input validator
    validator: Validator,
    /// Change classification for the live list
    detector: ChangeDetector,
    /// Streaming commit throttle
    coalescer: UpdateCoalescer<PendingCommit>,
    /// Active conversation and its stream
    switcher: ConversationSwitcher,
    /// Current operational state
    state: SyncState,
    /// In-memory message list of the active conversation
    live_messages: Vec<ChatMessage>,
    /// Whether the live list has been marked as streaming
    loading: bool,
    /// Text of the message in flight, restored if it fails
    pending_input: Option<String>,
    /// Channel to surfaces
    tx: mpsc::Sender<SyncMessage>,
    /// Event bus handed to stream sources and surfaces
    events_tx: mpsc::WeakSender<SyncEvent>,
    /// Keeps the event bus open until [`Self::run`] takes over
    events_anchor: Option<mpsc::Sender<SyncEvent>>,
    /// Receiving end of the event bus
    events_rx: mpsc::Receiver<SyncEvent>,
}

impl<B: CompletionService + 'static, S: ConversationStore> SyncEngine<B, S> {
    /// Create a new engine
    pub fn new(
        backend: B,
        store: S,
        mut registry: ModelRegistry,
        config: SyncConfig,
        tx: mpsc::Sender<SyncMessage>,
    ) -> Self {
        if let Err(e) = registry.set_default_model(&config.model) {
            tracing::warn!(model = %config.model, error = %e, "Configured model is not supported, keeping registry default");
        }

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let validator = Validator::new(config.limits.clone());
        let coalescer = UpdateCoalescer::new(config.coalesce_window);

        Self {
            config,
            backend: Arc::new(backend),
            store,
            registry,
            validator,
            detector: ChangeDetector::new(),
            coalescer,
            switcher: ConversationSwitcher::new(),
            state: SyncState::Initializing,
            live_messages: Vec::new(),
            loading: false,
            pending_input: None,
            tx,
            events_tx: events_tx.downgrade(),
            events_anchor: Some(events_tx),
            events_rx,
        }
    }

    /// Sender for surfaces to submit events
    ///
    /// Returns `None` once the engine has shut down.
    #[must_use]
    pub fn event_sender(&self) -> Option<mpsc::Sender<SyncEvent>> {
        self.events_tx.upgrade()
    }

    /// Get current state
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// The active conversation ID
    #[must_use]
    pub fn active_conversation(&self) -> Option<&ConversationId> {
        self.switcher.active()
    }

    /// The live message list of the active conversation
    #[must_use]
    pub fn live_messages(&self) -> &[ChatMessage] {
        &self.live_messages
    }

    /// Borrow the store
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Select the most recent conversation (creating one if there is none)
    pub async fn start(&mut self) -> anyhow::Result<()> {
        self.set_state(SyncState::Initializing).await;

        match self.store.most_recent() {
            Ok(Some(conversation)) => self.switch_to(Some(conversation.id)).await,
            Ok(None) => self.create_conversation().await,
            Err(e) => self.report(SyncError::from(e)).await,
        }

        self.send_listing().await;
        self.set_state(SyncState::Ready).await;
        Ok(())
    }

    /// Handle one event
    pub async fn handle_event(&mut self, event: SyncEvent) -> anyhow::Result<()> {
        match event {
            SyncEvent::UserMessage { content } => self.handle_user_message(content).await,

            SyncEvent::SelectConversation { id } => match self.store.get(&id) {
                Ok(Some(_)) => self.switch_to(Some(id)).await,
                Ok(None) => {
                    self.notify(NotifyLevel::Warning, &format!("Conversation not found: {id}"))
                        .await;
                }
                Err(e) => self.report(e.into()).await,
            },

            SyncEvent::NewConversation => {
                self.create_conversation().await;
                self.send_listing().await;
            }

            SyncEvent::DeleteConversation { id } => {
                self.delete_conversation(&id).await;
                self.send_listing().await;
            }

            SyncEvent::RenameConversation { id, title } => {
                let title = title.trim();
                if title.is_empty() {
                    self.report(SyncError::Validation("Title cannot be empty".to_string()))
                        .await;
                } else {
                    match self.store.set(&id, ConversationPatch::new().with_title(title)) {
                        Ok(conversation) => {
                            self.send(SyncMessage::ConversationCommitted { conversation })
                                .await;
                            self.send_listing().await;
                        }
                        Err(e) => self.report(e.into()).await,
                    }
                }
            }

            SyncEvent::ChangeModel { model } => self.change_model(&model).await,

            SyncEvent::ListConversations => self.send_listing().await,

            SyncEvent::Stream(update) => self.handle_stream_update(update).await,

            SyncEvent::Tick => self.flush_due().await,

            SyncEvent::Shutdown => self.shutdown().await?,
        }

        Ok(())
    }

    /// Commit the coalesced update if its window has passed
    pub async fn flush_due(&mut self) {
        if let Some(pending) = self.coalescer.poll_due(Instant::now()) {
            tracing::debug!(conversation = %pending.conversation_id, "Committing coalesced update");
            self.commit(pending).await;
        }
    }

    /// Wait for the next event or coalescer deadline and handle it.
    ///
    /// Returns `Ok(false)` after shutdown or when every sender is gone.
    pub async fn step(&mut self) -> anyhow::Result<bool> {
        let wake = {
            let deadline = self.coalescer.deadline();
            tokio::select! {
                event = self.events_rx.recv() => Wake::Event(event),
                () = sleep_until_deadline(deadline) => Wake::Deadline,
            }
        };

        match wake {
            Wake::Deadline => {
                self.flush_due().await;
                Ok(true)
            }
            Wake::Event(Some(SyncEvent::Shutdown)) => {
                self.shutdown().await?;
                Ok(false)
            }
            Wake::Event(Some(event)) => {
                if let Err(e) = self.handle_event(event).await {
                    tracing::error!(error = %e, "Failed to handle event");
                }
                Ok(true)
            }
            Wake::Event(None) => {
                tracing::debug!("Event channel closed");
                self.shutdown().await?;
                Ok(false)
            }
        }
    }

    /// Run the event loop until shutdown or until every sender is dropped
    pub async fn run(&mut self) -> anyhow::Result<()> {
        // From here on the bus lives only as long as surfaces and streams hold it
        self.events_anchor = None;
        while self.step().await? {}
        Ok(())
    }

    /// Flush pending work and stop streaming
    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        if self.state == SyncState::ShuttingDown {
            return Ok(());
        }
        self.set_state(SyncState::ShuttingDown).await;

        if let Some(pending) = self.coalescer.flush() {
            self.commit(pending).await;
        }

        if self.switcher.cancel_stream().is_some() && self.loading {
            if let Some(id) = self.switcher.active().cloned() {
                self.mark_not_streaming(&id).await;
            }
        }
        self.loading = false;
        self.pending_input = None;
        self.events_anchor = None;

        self.send(SyncMessage::Quit {
            message: Some("Goodbye!".to_string()),
        })
        .await;
        Ok(())
    }

    // ========================================================================
    // User Messages
    // ========================================================================

    async fn handle_user_message(&mut self, content: String) {
        if self.state.is_loading() {
            tracing::warn!("Rejected submit while a response is in flight");
            self.notify(NotifyLevel::Warning, BUSY_MESSAGE).await;
            self.send(SyncMessage::RestoreInput { content }).await;
            return;
        }

        if let ValidationResult::Invalid(reason) = self.validator.validate(&content) {
            tracing::warn!(reason = %reason, "Rejected user message");
            self.report(SyncError::Validation(reason)).await;
            self.send(SyncMessage::RestoreInput { content }).await;
            return;
        }

        if self.switcher.active().is_none() {
            self.create_conversation().await;
        }

        let conversation = match self.active_from_store() {
            Ok(Some(conversation)) => conversation,
            Ok(None) => {
                self.notify(NotifyLevel::Error, "No active conversation").await;
                self.send(SyncMessage::RestoreInput { content }).await;
                return;
            }
            Err(e) => {
                self.report(e).await;
                self.send(SyncMessage::RestoreInput { content }).await;
                return;
            }
        };

        if let Err(e) = self.registry.resolve(&conversation.model) {
            self.report(e.into()).await;
            self.send(SyncMessage::RestoreInput { content }).await;
            return;
        }

        let (Some(ticket), Some(events_tx)) = (self.switcher.ticket(), self.events_tx.upgrade())
        else {
            tracing::warn!("Event bus closed, dropping submit");
            self.send(SyncMessage::RestoreInput { content }).await;
            return;
        };

        let user_message = ChatMessage::user(content.trim());
        let source = MessageStreamSource::new(
            ticket,
            conversation.model.clone(),
            self.live_messages.clone(),
            self.config.system_prompt.clone(),
        )
        .with_temperature(self.config.temperature);

        tracing::debug!(
            conversation = %conversation.id,
            model = %conversation.model,
            backend = self.backend.name(),
            "Starting stream"
        );

        let handle = source.start(Arc::clone(&self.backend), user_message, events_tx);
        self.switcher.attach(handle);
        self.pending_input = Some(content);
        self.set_state(SyncState::Submitting).await;
    }

    // ========================================================================
    // Stream Updates
    // ========================================================================

    async fn handle_stream_update(&mut self, update: SourceUpdate) {
        if !self.switcher.is_current(update.ticket()) {
            let ticket = update.ticket();
            tracing::debug!(
                conversation = %ticket.conversation_id,
                epoch = ticket.epoch,
                current_epoch = self.switcher.epoch(),
                "Discarding stale stream update"
            );
            return;
        }

        match update {
            SourceUpdate::Snapshot {
                ticket,
                messages,
                loading,
            } => {
                let class = match self.detector.observe(&messages, loading) {
                    Detection::Immediate => CommitClass::Immediate,
                    Detection::Streaming => CommitClass::Streaming,
                    Detection::Unchanged | Detection::Shrunk { .. } => return,
                };

                self.live_messages.clone_from(&messages);
                self.loading = loading;

                let pending = PendingCommit {
                    conversation_id: ticket.conversation_id,
                    messages,
                    loading,
                };
                if let Some(commit) = self.coalescer.offer(pending, class, Instant::now()) {
                    self.commit(commit).await;
                }

                if loading {
                    let replying = self
                        .live_messages
                        .last()
                        .is_some_and(|m| m.role == MessageRole::Assistant);
                    if replying {
                        self.set_state(SyncState::Streaming).await;
                    }
                } else {
                    self.switcher.release();
                    self.pending_input = None;
                    self.set_state(SyncState::Ready).await;
                }
            }

            SourceUpdate::Failed { ticket, error } => {
                self.switcher.release();
                let superseded = self.coalescer.flush();

                if self.loading {
                    // Keep what arrived, just stop the streaming indicator
                    self.detector.observe(&self.live_messages, false);
                    self.loading = false;
                    let commit = superseded.unwrap_or_else(|| PendingCommit {
                        conversation_id: ticket.conversation_id.clone(),
                        messages: self.live_messages.clone(),
                        loading: false,
                    });
                    self.commit(PendingCommit {
                        loading: false,
                        ..commit
                    })
                    .await;
                }

                tracing::warn!(conversation = %ticket.conversation_id, error = %error, "Stream failed");
                self.report(SyncError::from(error)).await;
                if let Some(content) = self.pending_input.take() {
                    self.send(SyncMessage::RestoreInput { content }).await;
                }
                self.set_state(SyncState::Ready).await;
            }
        }
    }

    /// Write a snapshot through the persistence boundary
    async fn commit(&mut self, pending: PendingCommit) {
        let PendingCommit {
            conversation_id,
            messages,
            loading,
        } = pending;

        let current_title = match self.store.get(&conversation_id) {
            Ok(Some(conversation)) => conversation.title,
            Ok(None) => {
                tracing::debug!(conversation = %conversation_id, "Dropping commit for deleted conversation");
                return;
            }
            Err(e) => {
                self.report(e.into()).await;
                return;
            }
        };

        let title = derive_title(&current_title, &messages);
        let mut patch = ConversationPatch::new()
            .with_messages(messages)
            .with_streaming(loading);
        if title != current_title {
            patch = patch.with_title(title);
        }

        match self.store.set(&conversation_id, patch) {
            Ok(conversation) => {
                tracing::debug!(
                    conversation = %conversation.id,
                    messages = conversation.messages.len(),
                    streaming = conversation.is_streaming,
                    "Committed conversation"
                );
                self.send(SyncMessage::ConversationCommitted { conversation })
                    .await;
            }
            Err(e) => {
                tracing::error!(conversation = %conversation_id, error = %e, "Failed to commit conversation");
                self.report(e.into()).await;
            }
        }
    }

    // ========================================================================
    // Conversation Management
    // ========================================================================

    /// Make `target` the active conversation
    async fn switch_to(&mut self, target: Option<ConversationId>) {
        let Some(transition) = self.switcher.begin(target) else {
            return;
        };

        // Flush whatever the old conversation still owes the store
        if let Some(pending) = self.coalescer.flush() {
            self.commit(pending).await;
        }
        if transition.cancelled.is_some() {
            if let Some(ref from) = transition.from {
                if self.loading {
                    self.mark_not_streaming(from).await;
                }
            }
            if !self.loading {
                // Cancelled before anything was committed
                if let Some(content) = self.pending_input.take() {
                    self.send(SyncMessage::RestoreInput { content }).await;
                }
            }
        }

        self.detector.reset();
        self.loading = false;
        self.pending_input = None;
        self.switcher.finish();

        let conversation = match transition.to {
            Some(ref id) => match self.store.get(id) {
                Ok(conversation) => conversation,
                Err(e) => {
                    self.report(e.into()).await;
                    None
                }
            },
            None => None,
        };

        self.live_messages = conversation
            .as_ref()
            .map(|c| c.messages.clone())
            .unwrap_or_default();
        self.detector.prime(&self.live_messages, false);

        tracing::debug!(from = ?transition.from, to = ?transition.to, "Switched conversation");
        self.send(SyncMessage::ActiveConversation { conversation })
            .await;
        if self.state != SyncState::Initializing {
            self.set_state(SyncState::Ready).await;
        }
    }

    async fn create_conversation(&mut self) {
        let conversation = Conversation::new(self.registry.default_model());
        let id = conversation.id.clone();
        match self.store.insert(conversation) {
            Ok(()) => {
                tracing::debug!(conversation = %id, "Created conversation");
                self.switch_to(Some(id)).await;
            }
            Err(e) => self.report(e.into()).await,
        }
    }

    async fn delete_conversation(&mut self, id: &ConversationId) {
        if self.switcher.active() == Some(id) {
            let next = match self.store.list_all() {
                Ok(all) => all.into_iter().map(|c| c.id).find(|c| c != id),
                Err(e) => {
                    self.report(e.into()).await;
                    return;
                }
            };
            self.switch_to(next).await;
        }

        match self.store.delete(id) {
            Ok(true) => tracing::debug!(conversation = %id, "Deleted conversation"),
            Ok(false) => {
                self.notify(NotifyLevel::Warning, &format!("Conversation not found: {id}"))
                    .await;
            }
            Err(e) => self.report(e.into()).await,
        }
    }

    async fn change_model(&mut self, model: &str) {
        if let Err(e) = self.registry.resolve(model) {
            self.report(e.into()).await;
            return;
        }

        let Some(id) = self.switcher.active().cloned() else {
            self.notify(NotifyLevel::Warning, "No active conversation").await;
            return;
        };

        match self.store.set(&id, ConversationPatch::new().with_model(model)) {
            Ok(conversation) => {
                tracing::info!(conversation = %id, model, "Changed model");
                self.send(SyncMessage::ConversationCommitted { conversation })
                    .await;
            }
            Err(e) => self.report(e.into()).await,
        }
    }

    async fn mark_not_streaming(&mut self, id: &ConversationId) {
        match self.store.set(id, ConversationPatch::new().with_streaming(false)) {
            Ok(conversation) => {
                self.send(SyncMessage::ConversationCommitted { conversation })
                    .await;
            }
            Err(e) => self.report(e.into()).await,
        }
    }

    fn active_from_store(&self) -> Result<Option<Conversation>, SyncError> {
        match self.switcher.active() {
            Some(id) => Ok(self.store.get(id)?),
            None => Ok(None),
        }
    }

    async fn send_listing(&self) {
        match self.store.list_all() {
            Ok(all) => {
                let entries = all.iter().map(Conversation::summary).collect();
                self.send(SyncMessage::ConversationList { entries }).await;
            }
            Err(e) => self.report(e.into()).await,
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn set_state(&mut self, state: SyncState) {
        if self.state != state {
            self.state = state;
            self.send(SyncMessage::State { state }).await;
        }
    }

    async fn report(&self, error: SyncError) {
        self.send(SyncMessage::Notify {
            level: error.level(),
            title: Some(error.title().to_string()),
            message: error.to_string(),
        })
        .await;
    }

    async fn notify(&self, level: NotifyLevel, message: &str) {
        self.send(SyncMessage::Notify {
            level,
            title: None,
            message: message.to_string(),
        })
        .await;
    }

    async fn send(&self, msg: SyncMessage) {
        if let Err(e) = self.tx.send(msg).await {
            tracing::warn!("Failed to send message to surface: {}", e);
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
