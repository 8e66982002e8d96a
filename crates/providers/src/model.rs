use serde::{Deserialize, Serialize};
use shared::settings::ProviderSettings;
use std::collections::{BTreeMap, HashMap};
use std::env;

/// Token cap used when a model does not report one.
pub const DEFAULT_MAX_TOKENS: u32 = 8000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub label: String,
    pub provider: String,
    pub max_token_allowed: u32,
}

impl ModelDescriptor {
    pub fn new(name: &str, label: &str, provider: &str, max_token_allowed: u32) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            provider: provider.to_string(),
            max_token_allowed,
        }
    }
}

/// Wire protocol spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    Anthropic,
    OpenAiCompatible,
    Ollama,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub name: String,
    pub kind: ProviderKind,
    pub static_models: Vec<ModelDescriptor>,
    pub default_model: String,
    /// Needs an API key or explicit configuration before it can be used.
    pub configurable: bool,
    /// Runs on the user's machine.
    pub local: bool,
    /// Whether the provider exposes a model listing endpoint.
    pub dynamic_models: bool,
    pub api_token_key: Option<String>,
    pub base_url_key: Option<String>,
    pub default_base_url: Option<String>,
    /// Seeds the settings store on first run.
    pub settings: ProviderSettings,
}

impl ProviderDescriptor {
    pub fn find_static_model(&self, name: &str) -> Option<&ModelDescriptor> {
        self.static_models.iter().find(|m| m.name == name)
    }

    /// Selectable in the UI: enabled, and either needs no setup or the user has done it.
    ///
    /// `settings` are the user's stored settings for this provider, not the
    /// descriptor's seed values.
    pub fn is_selectable(&self, settings: &ProviderSettings) -> bool {
        settings.enabled && (!self.configurable || settings.has_credentials())
    }
}

/// Caller-supplied credentials for one request.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Per-request API keys keyed by provider name.
    pub api_keys: HashMap<String, String>,
    pub provider_settings: BTreeMap<String, ProviderSettings>,
    /// Server-side environment overrides (checked before the process env).
    pub server_env: HashMap<String, String>,
}

impl Credentials {
    pub fn with_settings(provider_settings: BTreeMap<String, ProviderSettings>) -> Self {
        Self {
            provider_settings,
            ..Default::default()
        }
    }

    /// API key lookup: request keys, provider settings, server env, process env.
    pub fn api_key_for(&self, provider: &ProviderDescriptor) -> Option<String> {
        let from_request = self.api_keys.get(&provider.name).cloned();
        let from_settings = self
            .provider_settings
            .get(&provider.name)
            .and_then(|s| s.api_key.clone());
        let from_env = provider
            .api_token_key
            .as_deref()
            .and_then(|key| self.env_value(key));

        from_request
            .or(from_settings)
            .or(from_env)
            .filter(|k| !k.trim().is_empty())
    }

    /// Base URL lookup: provider settings, server env, process env, default.
    pub fn base_url_for(&self, provider: &ProviderDescriptor) -> Option<String> {
        let from_settings = self
            .provider_settings
            .get(&provider.name)
            .and_then(|s| s.base_url.clone())
            .filter(|u| !u.trim().is_empty());
        let from_env = provider
            .base_url_key
            .as_deref()
            .and_then(|key| self.env_value(key));

        from_settings
            .or(from_env)
            .or_else(|| provider.default_base_url.clone())
            .map(|u| u.trim_end_matches('/').to_string())
    }

    fn env_value(&self, key: &str) -> Option<String> {
        self.server_env
            .get(key)
            .cloned()
            .or_else(|| env::var(key).ok())
            .filter(|v| !v.trim().is_empty())
    }
}
