//! Completion Service Traits
//!
//! Trait definitions for chat-completion backends. The sync core only ever
//! sees this contract, so hosted providers, local servers and scripted test
//! doubles are interchangeable.
//!
//! # Design Philosophy
//!
//! A backend accepts a fully built request and hands back a channel of
//! tokens. Everything before the channel exists (credential lookup, model
//! resolution, the HTTP handshake) fails through the `Result`; everything
//! after arrives as [`StreamingToken::Error`].

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::conversation::ChatMessage;
use crate::messages::MessageRole;
use crate::registry::Provider;

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default system instruction
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "Write about the given topic. Markdown is supported. Use headings wherever appropriate.";

/// Token stream events from completion backends
#[derive(Clone, Debug, PartialEq)]
pub enum StreamingToken {
    /// A token from the response
    Token(String),
    /// Response completed successfully
    Complete {
        /// The complete message (may differ from concatenated tokens)
        message: String,
    },
    /// Error occurred during streaming
    Error(String),
}

/// Completion failures
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CompletionError {
    /// The provider's API key is not set
    #[error("API key not configured. Please set {env_var} for {provider}.")]
    MissingCredential {
        /// Provider display name
        provider: String,
        /// Environment variable that should hold the key
        env_var: String,
    },

    /// The requested model is not supported
    #[error("Unsupported model: {0}")]
    UnknownModel(String),

    /// The provider rejected the API key
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The provider answered with an error status
    #[error("Service returned {status}: {body}")]
    Service {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// The connection failed or broke mid-stream
    #[error("Transport error: {0}")]
    Transport(String),
}

impl CompletionError {
    /// Missing credential for a provider
    #[must_use]
    pub fn missing_credential(provider: Provider) -> Self {
        Self::MissingCredential {
            provider: provider.display_name().to_string(),
            env_var: provider.credential_env().to_string(),
        }
    }

    /// Whether the failure is a configuration problem rather than a transport one
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential { .. } | Self::UnknownModel(_) | Self::Authentication(_)
        )
    }
}

/// One turn of request history
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestMessage {
    /// Who sent it
    pub role: MessageRole,
    /// Message text
    pub content: String,
}

impl From<&ChatMessage> for RequestMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Configuration for completion requests
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    /// Model to use (registry identifier)
    pub model: String,
    /// Ordered conversation history, ending with the new user message
    pub messages: Vec<RequestMessage>,
    /// Temperature (0.0-2.0)
    pub temperature: f32,
    /// System instruction (optional, sent ahead of the history)
    pub system: Option<String>,
}

impl CompletionRequest {
    /// Create a request for a model with empty history
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: DEFAULT_TEMPERATURE,
            system: None,
        }
    }

    /// Set history from stored messages
    #[must_use]
    pub fn with_history(mut self, history: &[ChatMessage]) -> Self {
        self.messages = history.iter().map(RequestMessage::from).collect();
        self
    }

    /// Append one message
    #[must_use]
    pub fn with_message(mut self, role: MessageRole, content: impl Into<String>) -> Self {
        self.messages.push(RequestMessage {
            role,
            content: content.into(),
        });
        self
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    /// Set system instruction
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Completion backend trait
///
/// Implement this trait to add support for different providers.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Get the backend name (e.g., "OpenAI-compatible")
    fn name(&self) -> &str;

    /// Send a request and get a streaming response
    ///
    /// Returns a channel receiver that will receive tokens as they arrive.
    /// The channel closes after [`StreamingToken::Complete`] or
    /// [`StreamingToken::Error`].
    async fn send_streaming(
        &self,
        request: &CompletionRequest,
    ) -> Result<mpsc::Receiver<StreamingToken>, CompletionError>;
}
