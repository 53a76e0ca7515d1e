//! Configuration
//!
//! Settings for the sync engine, loaded from an optional TOML file at
//! `$XDG_CONFIG_HOME/chatsync/config.toml` and from environment variables.
//!
//! # Configuration Priority
//!
//! Highest first:
//! 1. CLI arguments (applied by the binary)
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [chat]
//! model = "gpt-4o-mini"
//! system_prompt = "Answer briefly."
//! temperature = 0.5
//!
//! [sync]
//! coalesce_ms = 50
//!
//! [security]
//! max_message_chars = 10000
//!
//! [storage]
//! path = "/home/me/.local/share/chatsync/conversations.json"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{DEFAULT_SYSTEM_PROMPT, DEFAULT_TEMPERATURE};
use crate::registry::DEFAULT_MODEL;
use crate::streaming::DEFAULT_COALESCE_WINDOW;
use crate::validation::InputLimits;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Where the effective configuration came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[chat]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// Model for new conversations
    pub model: Option<String>,
    /// System instruction sent with every request
    pub system_prompt: Option<String>,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

/// `[sync]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncToml {
    /// Coalescing window in milliseconds
    pub coalesce_ms: Option<u64>,
}

/// `[security]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityToml {
    /// Maximum message length in characters
    pub max_message_chars: Option<usize>,
}

/// `[storage]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageToml {
    /// Conversation file path
    pub path: Option<PathBuf>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatsyncToml {
    /// Chat section
    pub chat: ChatToml,
    /// Sync section
    pub sync: SyncToml,
    /// Security section
    pub security: SecurityToml,
    /// Storage section
    pub storage: StorageToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Sync engine configuration
#[derive(Clone, Debug, PartialEq)]
pub struct SyncConfig {
    /// Model for new conversations
    pub model: String,
    /// System instruction sent with every request
    pub system_prompt: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Coalescing window for streaming commits
    pub coalesce_window: Duration,
    /// Input limits
    pub limits: InputLimits,
    /// Conversation file (`None` uses the store's default location)
    pub store_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            temperature: DEFAULT_TEMPERATURE,
            coalesce_window: DEFAULT_COALESCE_WINDOW,
            limits: InputLimits::default(),
            store_path: None,
        }
    }
}

impl SyncConfig {
    /// Create configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        apply_env_config(&mut config, |key| std::env::var(key).ok());
        config
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        if self.limits.max_message_chars == 0 {
            return Err(ConfigError::ValidationError(
                "max_message_chars must be greater than zero".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "model must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/chatsync/config.toml` or
/// `~/.config/chatsync/config.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("chatsync").join("config.toml"))
}

/// Load configuration from the default file and the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if a
/// value is out of range. A missing config file is not an error.
pub fn load_config() -> Result<(SyncConfig, ConfigSource), ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path and the environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(
    path: Option<PathBuf>,
) -> Result<(SyncConfig, ConfigSource), ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

fn load_config_with(
    path: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<(SyncConfig, ConfigSource), ConfigError> {
    let mut config = SyncConfig::default();
    let mut source = ConfigSource::Default;

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ChatsyncToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    if apply_env_config(&mut config, env) {
        source = ConfigSource::Env;
    }

    config.validate()?;
    Ok((config, source))
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut SyncConfig, toml: &ChatsyncToml) {
    if let Some(ref model) = toml.chat.model {
        config.model = model.clone();
    }
    if toml.chat.system_prompt.is_some() {
        config.system_prompt = toml.chat.system_prompt.clone();
    }
    if let Some(temperature) = toml.chat.temperature {
        config.temperature = temperature;
    }
    if let Some(ms) = toml.sync.coalesce_ms {
        config.coalesce_window = Duration::from_millis(ms);
    }
    if let Some(max) = toml.security.max_message_chars {
        config.limits.max_message_chars = max;
    }
    if toml.storage.path.is_some() {
        config.store_path = toml.storage.path.clone();
    }
}

/// Apply environment variable overrides; returns whether any applied
fn apply_env_config(config: &mut SyncConfig, env: impl Fn(&str) -> Option<String>) -> bool {
    let mut applied = false;

    if let Some(model) = env("CHATSYNC_MODEL") {
        config.model = model;
        applied = true;
    }
    if let Some(prompt) = env("CHATSYNC_SYSTEM_PROMPT") {
        // An empty prompt disables the system instruction
        config.system_prompt = Some(prompt).filter(|p| !p.trim().is_empty());
        applied = true;
    }
    if let Some(temperature) = env("CHATSYNC_TEMPERATURE").and_then(|v| v.parse().ok()) {
        config.temperature = temperature;
        applied = true;
    }
    if let Some(ms) = env("CHATSYNC_COALESCE_MS").and_then(|v| v.parse().ok()) {
        config.coalesce_window = Duration::from_millis(ms);
        applied = true;
    }
    if let Some(max) = env("CHATSYNC_MAX_MESSAGE_CHARS").and_then(|v| v.parse().ok()) {
        config.limits.max_message_chars = max;
        applied = true;
    }
    if let Some(path) = env("CHATSYNC_STORE_PATH") {
        config.store_path = Some(PathBuf::from(path));
        applied = true;
    }

    applied
}
