//! Error taxonomy for the sync engine.
//!
//! Every failure is turned into a [`crate::messages::SyncMessage::Notify`] at
//! the point where it is handled. None of them end the session.

use thiserror::Error;

use crate::backend::CompletionError;
use crate::messages::NotifyLevel;
use crate::registry::RegistryError;
use crate::store::StoreError;

/// Generic notice for failed sends
pub const SEND_FAILED: &str = "Failed to send message. Please try again.";

/// Sync engine errors
#[derive(Debug, Error)]
pub enum SyncError {
    /// Input rejected before anything was sent
    #[error("{0}")]
    Validation(String),

    /// Missing credential or unsupported model
    #[error("{0}")]
    Configuration(String),

    /// The completion service failed before or during streaming
    #[error("Failed to send message. Please try again. ({0})")]
    Transport(CompletionError),

    /// A store read or write failed
    #[error("Failed to save conversation: {0}")]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Notification level for this error
    #[must_use]
    pub fn level(&self) -> NotifyLevel {
        match self {
            Self::Validation(_) => NotifyLevel::Warning,
            Self::Configuration(_) | Self::Transport(_) | Self::Store(_) => NotifyLevel::Error,
        }
    }

    /// Notification title
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Invalid message",
            Self::Configuration(_) => "Configuration",
            Self::Transport(_) => "Send failed",
            Self::Store(_) => "Storage",
        }
    }
}

impl From<CompletionError> for SyncError {
    fn from(error: CompletionError) -> Self {
        match error {
            CompletionError::MissingCredential { ref env_var, .. } => Self::Configuration(format!(
                "API key not configured. Please set {env_var} in your environment variables."
            )),
            CompletionError::UnknownModel(model) => {
                Self::Configuration(format!("Unsupported model: {model}"))
            }
            CompletionError::Authentication(_) => Self::Configuration(
                "API key rejected. Please check your environment variables.".to_string(),
            ),
            other => Self::Transport(other),
        }
    }
}

impl From<RegistryError> for SyncError {
    fn from(error: RegistryError) -> Self {
        Self::Configuration(error.to_string())
    }
}
