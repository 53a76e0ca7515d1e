//! Model Registry
//!
//! The set of model identifiers a conversation may select, which provider
//! serves each one, and which credential that provider needs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Model selected for new conversations
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-05-20";

/// Registry lookup errors
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The identifier is not a supported model
    #[error("Unsupported model: {0}")]
    UnknownModel(String),
}

/// Hosted model providers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    /// Google Gemini
    Google,
    /// OpenAI
    OpenAi,
    /// Anthropic
    Anthropic,
    /// OpenRouter
    OpenRouter,
}

impl Provider {
    /// All providers
    pub const ALL: [Provider; 4] = [
        Provider::Google,
        Provider::OpenAi,
        Provider::Anthropic,
        Provider::OpenRouter,
    ];

    /// Human-readable name
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::OpenRouter => "OpenRouter",
        }
    }

    /// Environment variable holding this provider's API key
    #[must_use]
    pub fn credential_env(&self) -> &'static str {
        match self {
            Self::Google => "GOOGLE_GENERATIVE_AI_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
        }
    }

    /// OpenAI-compatible chat endpoint root
    #[must_use]
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }

    /// Environment variable overriding [`Self::default_base_url`]
    #[must_use]
    pub fn base_url_env(&self) -> &'static str {
        match self {
            Self::Google => "CHATSYNC_GOOGLE_BASE_URL",
            Self::OpenAi => "CHATSYNC_OPENAI_BASE_URL",
            Self::Anthropic => "CHATSYNC_ANTHROPIC_BASE_URL",
            Self::OpenRouter => "CHATSYNC_OPENROUTER_BASE_URL",
        }
    }
}

/// Pricing tier shown next to a model
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pricing {
    /// No cost
    Free,
    /// Paid usage
    Paid,
}

/// A supported model
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Identifier sent to the provider
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Serving provider
    pub provider: Provider,
    /// Context window in tokens
    pub context_window: u32,
    /// Pricing tier
    pub pricing: Pricing,
}

/// Where API keys come from
#[derive(Clone, Debug, Default)]
pub enum Credentials {
    /// Read each provider's variable from the process environment
    #[default]
    Environment,
    /// Fixed keys (tests, embedding applications)
    Fixed(HashMap<Provider, String>),
}

impl Credentials {
    /// Look up the key for a provider; empty values count as missing
    #[must_use]
    pub fn lookup(&self, provider: Provider) -> Option<String> {
        let value = match self {
            Self::Environment => std::env::var(provider.credential_env()).ok(),
            Self::Fixed(keys) => keys.get(&provider).cloned(),
        };
        value.filter(|v| !v.trim().is_empty())
    }
}

/// Registry of supported models
#[derive(Clone, Debug)]
pub struct ModelRegistry {
    models: Vec<ModelSpec>,
    default_model: String,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelRegistry {
    /// Registry with the built-in model list
    #[must_use]
    pub fn builtin() -> Self {
        use Pricing::{Free, Paid};
        use Provider::{Anthropic, Google, OpenAi, OpenRouter};

        let table: [(&str, &str, Provider, u32, Pricing); 18] = [
            (DEFAULT_MODEL, "Gemini 2.5 Flash", Google, 1_000_000, Paid),
            ("gemini-2.5-pro-preview-05-20", "Gemini 2.5 Pro", Google, 2_000_000, Paid),
            ("gemini-1.5-flash", "Gemini 1.5 Flash", Google, 1_000_000, Paid),
            ("gemini-1.5-pro", "Gemini 1.5 Pro", Google, 2_000_000, Paid),
            ("gpt-4o", "GPT-4o", OpenAi, 128_000, Paid),
            ("gpt-4o-mini", "GPT-4o Mini", OpenAi, 128_000, Paid),
            ("gpt-4-turbo", "GPT-4 Turbo", OpenAi, 128_000, Paid),
            ("gpt-3.5-turbo", "GPT-3.5 Turbo", OpenAi, 16_385, Paid),
            ("claude-3-5-sonnet-20241022", "Claude 3.5 Sonnet", Anthropic, 200_000, Paid),
            ("claude-3-5-haiku-20241022", "Claude 3.5 Haiku", Anthropic, 200_000, Paid),
            ("claude-3-opus-20240229", "Claude 3 Opus", Anthropic, 200_000, Paid),
            ("qwen/qwen3-30b-a3b:free", "Qwen3 30B (free)", OpenRouter, 40_960, Free),
            ("meta-llama/llama-3.2-3b-instruct:free", "Llama 3.2 3B (free)", OpenRouter, 131_072, Free),
            ("meta-llama/llama-3.2-1b-instruct:free", "Llama 3.2 1B (free)", OpenRouter, 131_072, Free),
            ("mistralai/mixtral-8x7b-instruct:free", "Mixtral 8x7B (free)", OpenRouter, 32_768, Free),
            ("google/gemma-2-9b-it:free", "Gemma 2 9B (free)", OpenRouter, 8_192, Free),
            ("meta-llama/llama-3.3-70b-instruct", "Llama 3.3 70B", OpenRouter, 131_072, Paid),
            ("qwen/qwen3-30b-a3b", "Qwen3 30B", OpenRouter, 40_960, Paid),
        ];

        let models = table
            .into_iter()
            .map(|(id, name, provider, context_window, pricing)| ModelSpec {
                id: id.to_string(),
                name: name.to_string(),
                provider,
                context_window,
                pricing,
            })
            .collect();

        Self {
            models,
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Registry with an explicit model list; the first model is the default
    #[must_use]
    pub fn with_models(models: Vec<ModelSpec>) -> Self {
        let default_model = models
            .first()
            .map_or_else(|| DEFAULT_MODEL.to_string(), |m| m.id.clone());
        Self {
            models,
            default_model,
        }
    }

    /// Change the default model
    pub fn set_default_model(&mut self, model: &str) -> Result<(), RegistryError> {
        self.resolve(model)?;
        self.default_model = model.to_string();
        Ok(())
    }

    /// Model used for new conversations
    #[must_use]
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Look up a model
    pub fn resolve(&self, model: &str) -> Result<&ModelSpec, RegistryError> {
        self.models
            .iter()
            .find(|m| m.id == model)
            .ok_or_else(|| RegistryError::UnknownModel(model.to_string()))
    }

    /// Whether the identifier is supported
    #[must_use]
    pub fn contains(&self, model: &str) -> bool {
        self.models.iter().any(|m| m.id == model)
    }

    /// All models, in display order
    #[must_use]
    pub fn models(&self) -> &[ModelSpec] {
        &self.models
    }

    /// Models served by one provider
    pub fn models_for(&self, provider: Provider) -> impl Iterator<Item = &ModelSpec> {
        self.models.iter().filter(move |m| m.provider == provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let registry = ModelRegistry::builtin();
        assert_eq!(registry.models().len(), 18);
        assert_eq!(registry.default_model(), DEFAULT_MODEL);
        assert!(registry.contains("gpt-4o"));
    }

    #[test]
    fn test_resolve_provider() {
        let registry = ModelRegistry::builtin();
        let spec = registry.resolve("claude-3-5-haiku-20241022").unwrap();
        assert_eq!(spec.provider, Provider::Anthropic);
        assert_eq!(spec.provider.credential_env(), "ANTHROPIC_API_KEY");
    }

    #[test]
    fn test_unknown_model() {
        let registry = ModelRegistry::builtin();
        let err = registry.resolve("gpt-9").unwrap_err();
        assert_eq!(err, RegistryError::UnknownModel("gpt-9".to_string()));
        assert_eq!(err.to_string(), "Unsupported model: gpt-9");
    }

    #[test]
    fn test_models_for_provider() {
        let registry = ModelRegistry::builtin();
        assert_eq!(registry.models_for(Provider::Google).count(), 4);
        assert_eq!(registry.models_for(Provider::OpenAi).count(), 4);
        assert_eq!(registry.models_for(Provider::Anthropic).count(), 3);
        assert_eq!(registry.models_for(Provider::OpenRouter).count(), 7);
    }

    #[test]
    fn test_set_default_model() {
        let mut registry = ModelRegistry::builtin();
        registry.set_default_model("gpt-4o-mini").unwrap();
        assert_eq!(registry.default_model(), "gpt-4o-mini");
        assert!(registry.set_default_model("nope").is_err());
        assert_eq!(registry.default_model(), "gpt-4o-mini");
    }

    #[test]
    fn test_fixed_credentials() {
        let mut keys = HashMap::new();
        keys.insert(Provider::OpenAi, "sk-test".to_string());
        keys.insert(Provider::Google, "   ".to_string());
        let creds = Credentials::Fixed(keys);

        assert_eq!(creds.lookup(Provider::OpenAi).as_deref(), Some("sk-test"));
        assert_eq!(creds.lookup(Provider::Google), None);
        assert_eq!(creds.lookup(Provider::Anthropic), None);
    }

    #[test]
    fn test_every_provider_has_distinct_credential() {
        let mut vars: Vec<_> = Provider::ALL.iter().map(Provider::credential_env).collect();
        vars.sort_unstable();
        vars.dedup();
        assert_eq!(vars.len(), 4);
    }
}
