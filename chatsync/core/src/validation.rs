//! Input Validation
//!
//! Outgoing messages are checked before they reach a stream source. A rejected
//! message starts no request and changes no state; the surface keeps the text
//! so the user can fix it.

use serde::{Deserialize, Serialize};

/// Default maximum message length in characters
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 10_000;

/// Rejection reason for blank input
pub const EMPTY_MESSAGE: &str = "Message cannot be empty";

/// Rejection reason for oversized input
pub const MESSAGE_TOO_LONG: &str = "Message is too long. Please shorten your message.";

/// Limits applied to user input
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputLimits {
    /// Maximum trimmed message length in characters (default: 10,000)
    pub max_message_chars: usize,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
        }
    }
}

impl InputLimits {
    /// Create limits from environment variables with fallback to defaults
    #[must_use]
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_message_chars: std::env::var("CHATSYNC_MAX_MESSAGE_CHARS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_message_chars),
        }
    }
}

/// Result of input validation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationResult {
    /// Input is valid
    Valid,
    /// Input is invalid with reason
    Invalid(String),
}

impl ValidationResult {
    /// Check if the result indicates valid input
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Get the error message if invalid
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Valid => None,
            Self::Invalid(msg) => Some(msg),
        }
    }
}

/// Validator for outgoing user messages
#[derive(Clone, Debug, Default)]
pub struct Validator {
    limits: InputLimits,
}

impl Validator {
    /// Create a validator with the given limits
    #[must_use]
    pub fn new(limits: InputLimits) -> Self {
        Self { limits }
    }

    /// Validate a user message.
    ///
    /// Both rules look at the trimmed content; length is counted in
    /// characters.
    #[must_use]
    pub fn validate(&self, content: &str) -> ValidationResult {
        let trimmed = content.trim();

        if trimmed.is_empty() {
            return ValidationResult::Invalid(EMPTY_MESSAGE.to_string());
        }

        if trimmed.chars().count() > self.limits.max_message_chars {
            return ValidationResult::Invalid(MESSAGE_TOO_LONG.to_string());
        }

        ValidationResult::Valid
    }

    /// Get the current limits
    #[must_use]
    pub fn limits(&self) -> &InputLimits {
        &self.limits
    }
}
