//! Chatsync Core - Streaming Chat Synchronization
//!
//! This crate keeps a locally persisted chat history in step with a response
//! streaming in from a remote model. It is headless: a terminal, a web view or
//! a test harness drives it through events and renders what it reports back.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           Surfaces                                │
//! │        ┌──────────┐    ┌──────────┐    ┌──────────────────┐      │
//! │        │   CLI    │    │  Web UI  │    │  Tests / Scripts │      │
//! │        └────┬─────┘    └────┬─────┘    └────────┬─────────┘      │
//! │             └───────────────┴───────────────────┘                │
//! │                    SyncEvent (up)   SyncMessage (down)           │
//! └─────────────────────────────┼────────────────────────────────────┘
//!                               │
//! ┌─────────────────────────────┼────────────────────────────────────┐
//! │                       CHATSYNC CORE                               │
//! │  ┌──────────────────────────┴───────────────────────────────┐    │
//! │  │                       SyncEngine                          │    │
//! │  │  ┌───────────┐ ┌──────────┐ ┌───────────┐ ┌────────────┐ │    │
//! │  │  │ Validator │ │ Detector │ │ Coalescer │ │  Switcher  │ │    │
//! │  │  └───────────┘ └──────────┘ └───────────┘ └────────────┘ │    │
//! │  └──────┬──────────────────────────────────────────┬────────┘    │
//! │         │ MessageStreamSource                      │             │
//! │  ┌──────┴────────────┐                    ┌────────┴──────────┐  │
//! │  │ CompletionService │                    │ ConversationStore │  │
//! │  └───────────────────┘                    └───────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`SyncEngine`]: The event-driven state container
//! - [`SyncEvent`]: Events from surfaces and stream sources
//! - [`SyncMessage`]: Messages from the engine to surfaces
//! - [`Conversation`]: A stored conversation and its messages
//! - [`CompletionService`]: Contract for streaming model backends
//! - [`ConversationStore`]: Contract for the persistence boundary
//!
//! # Quick Start
//!
//! ```ignore
//! use chatsync_core::{
//!     load_config, JsonFileStore, ModelRegistry, OpenAiCompatibleBackend, SyncEngine, SyncEvent,
//! };
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (config, _source) = load_config()?;
//!     let registry = ModelRegistry::builtin();
//!     let store = JsonFileStore::open(JsonFileStore::default_path(), &registry);
//!     let backend = OpenAiCompatibleBackend::from_env(registry.clone());
//!
//!     let (tx, mut rx) = mpsc::channel(100);
//!     let mut engine = SyncEngine::new(backend, store, registry, config, tx);
//!     engine.start().await?;
//!
//!     let events = engine.event_sender().expect("engine is running");
//!     events.send(SyncEvent::UserMessage { content: "Hello".into() }).await?;
//!
//!     tokio::spawn(async move { engine.run().await });
//!     while let Some(msg) = rx.recv().await {
//!         // Render message
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: Completion backend abstraction (OpenAI-compatible providers)
//! - [`config`]: TOML and environment configuration
//! - [`conversation`]: Conversations, messages and partial updates
//! - [`engine`]: The sync engine
//! - [`error`]: Error taxonomy
//! - [`events`]: Events into the engine
//! - [`messages`]: Messages out of the engine
//! - [`registry`]: Supported models, providers and credentials
//! - [`store`]: Persistence boundary (memory and JSON file)
//! - [`streaming`]: Stream source, change detection and commit coalescing
//! - [`switch`]: Active conversation tracking
//! - [`title`]: Title derivation
//! - [`validation`]: Input validation

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod conversation;
pub mod engine;
pub mod error;
pub mod events;
pub mod messages;
pub mod registry;
pub mod store;
pub mod streaming;
pub mod switch;
pub mod title;
pub mod validation;

// Re-exports for convenience
pub use backend::{
    CompletionError, CompletionRequest, CompletionService, OpenAiCompatibleBackend,
    StreamingToken,
};
pub use config::{load_config, load_config_from_path, ConfigError, ConfigSource, SyncConfig};
pub use conversation::{ChatMessage, Conversation, ConversationPatch, ConversationSummary};
pub use engine::SyncEngine;
pub use error::SyncError;
pub use events::SyncEvent;
pub use messages::{
    ConversationId, MessageId, MessageRole, NotifyLevel, SyncMessage, SyncState,
};
pub use registry::{Credentials, ModelRegistry, ModelSpec, Provider, RegistryError, DEFAULT_MODEL};
pub use store::{ConversationStore, JsonFileStore, MemoryStore, StoreError};
pub use streaming::{
    ChangeDetector, CommitClass, Detection, MessageStreamSource, SourceUpdate, StreamHandle,
    StreamTicket, UpdateCoalescer,
};
pub use switch::{ConversationSwitcher, SwitchState, Transition};
pub use title::{derive_title, NEW_CHAT_TITLE};
pub use validation::{InputLimits, ValidationResult, Validator};
