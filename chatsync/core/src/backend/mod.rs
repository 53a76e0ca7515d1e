//! Completion Backend Integration
//!
//! Abstracted access to chat-completion providers through a common trait.
//!
//! # Available Backends
//!
//! - **OpenAI-compatible**: Google, OpenAI, Anthropic and OpenRouter through
//!   their OpenAI-style streaming endpoints
//!
//! # Usage
//!
//! ```ignore
//! use chatsync_core::backend::{CompletionRequest, CompletionService, OpenAiCompatibleBackend};
//! use chatsync_core::registry::ModelRegistry;
//!
//! let backend = OpenAiCompatibleBackend::from_env(ModelRegistry::builtin());
//! let request = CompletionRequest::new("gpt-4o-mini").with_message(MessageRole::User, "Hello!");
//! let rx = backend.send_streaming(&request).await?;
//! ```

mod openai;
mod traits;

pub use openai::OpenAiCompatibleBackend;
pub use traits::{
    CompletionError, CompletionRequest, CompletionService, RequestMessage, StreamingToken,
    DEFAULT_SYSTEM_PROMPT, DEFAULT_TEMPERATURE,
};
