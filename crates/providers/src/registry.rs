//! Static provider registry and dynamic model listing.

use crate::anthropic::AnthropicClient;
use crate::client::LanguageModel;
use crate::error::ProviderError;
use crate::model::{Credentials, ModelDescriptor, ProviderDescriptor, ProviderKind};
use crate::ollama::OllamaClient;
use crate::openai::OpenAiCompatibleClient;
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared::settings::{ProviderSettings, DEFAULT_PROVIDER};
use std::collections::{BTreeMap, HashMap};

/// Source of provider descriptors, model lists and model instances.
#[async_trait]
pub trait ModelCatalog: Send + Sync {
    fn providers(&self) -> &[ProviderDescriptor];

    fn default_provider(&self) -> &ProviderDescriptor;

    /// Models discovered at runtime, excluding the static list.
    async fn dynamic_models(
        &self,
        provider: &ProviderDescriptor,
        credentials: &Credentials,
    ) -> Result<Vec<ModelDescriptor>>;

    fn model_instance(
        &self,
        provider: &ProviderDescriptor,
        model: &ModelDescriptor,
        credentials: &Credentials,
    ) -> Result<Box<dyn LanguageModel>, ProviderError>;

    fn find_provider(&self, name: &str) -> Option<&ProviderDescriptor> {
        self.providers().iter().find(|p| p.name == name)
    }

    /// Drop any cached dynamic model lists, e.g. after credentials change.
    fn clear_cache(&self) {}
}

/// Fetches a provider's live model list.
#[async_trait]
pub trait ModelLister: Send + Sync {
    async fn list_models(
        &self,
        provider: &ProviderDescriptor,
        credentials: &Credentials,
    ) -> Result<Vec<ModelDescriptor>>;
}

/// Lists models over HTTP with each provider's own client.
pub struct HttpModelLister;

#[async_trait]
impl ModelLister for HttpModelLister {
    async fn list_models(
        &self,
        provider: &ProviderDescriptor,
        credentials: &Credentials,
    ) -> Result<Vec<ModelDescriptor>> {
        let Some(base_url) = credentials.base_url_for(provider) else {
            tracing::debug!(provider = %provider.name, "no base URL, skipping model listing");
            return Ok(Vec::new());
        };
        let api_key = credentials.api_key_for(provider);

        match provider.kind {
            ProviderKind::Anthropic => match api_key {
                Some(key) => AnthropicClient::list_models(&provider.name, &key, &base_url).await,
                None => {
                    tracing::debug!(provider = %provider.name, "no API key, skipping model listing");
                    Ok(Vec::new())
                }
            },
            ProviderKind::OpenAiCompatible => {
                if api_key.is_none() && !provider.local && provider.api_token_key.is_some() {
                    tracing::debug!(provider = %provider.name, "no API key, skipping model listing");
                    return Ok(Vec::new());
                }
                OpenAiCompatibleClient::list_models(&provider.name, api_key.as_deref(), &base_url)
                    .await
            }
            ProviderKind::Ollama => OllamaClient::list_models(&provider.name, &base_url).await,
        }
    }
}

fn model(name: &str, label: &str, provider: &str, max: u32) -> ModelDescriptor {
    ModelDescriptor::new(name, label, provider, max)
}

fn builtin_providers() -> Vec<ProviderDescriptor> {
    vec![
        ProviderDescriptor {
            name: "Anthropic".into(),
            kind: ProviderKind::Anthropic,
            static_models: vec![
                model("claude-3-7-sonnet-20250219", "Claude 3.7 Sonnet", "Anthropic", 8000),
                model("claude-3-5-sonnet-latest", "Claude 3.5 Sonnet", "Anthropic", 8000),
                model("claude-3-5-haiku-latest", "Claude 3.5 Haiku", "Anthropic", 8000),
            ],
            default_model: "claude-3-5-sonnet-latest".into(),
            configurable: true,
            local: false,
            dynamic_models: true,
            api_token_key: Some("ANTHROPIC_API_KEY".into()),
            base_url_key: None,
            default_base_url: Some("https://api.anthropic.com".into()),
            settings: ProviderSettings::enabled(),
        },
        ProviderDescriptor {
            name: "OpenAI".into(),
            kind: ProviderKind::OpenAiCompatible,
            static_models: vec![
                model("gpt-4o", "GPT-4o", "OpenAI", 8000),
                model("gpt-4o-mini", "GPT-4o Mini", "OpenAI", 8000),
                model("o3-mini", "o3-mini", "OpenAI", 16000),
            ],
            default_model: "gpt-4o".into(),
            configurable: true,
            local: false,
            dynamic_models: true,
            api_token_key: Some("OPENAI_API_KEY".into()),
            base_url_key: None,
            default_base_url: Some("https://api.openai.com/v1".into()),
            settings: ProviderSettings::enabled(),
        },
        ProviderDescriptor {
            name: "OpenRouter".into(),
            kind: ProviderKind::OpenAiCompatible,
            static_models: vec![
                model("anthropic/claude-3.5-sonnet", "Claude 3.5 Sonnet (OpenRouter)", "OpenRouter", 8000),
                model("openai/gpt-4o", "GPT-4o (OpenRouter)", "OpenRouter", 8000),
            ],
            default_model: "anthropic/claude-3.5-sonnet".into(),
            configurable: true,
            local: false,
            dynamic_models: true,
            api_token_key: Some("OPENROUTER_API_KEY".into()),
            base_url_key: None,
            default_base_url: Some("https://openrouter.ai/api/v1".into()),
            settings: ProviderSettings::enabled(),
        },
        ProviderDescriptor {
            name: "Deepseek".into(),
            kind: ProviderKind::OpenAiCompatible,
            static_models: vec![
                model("deepseek-chat", "Deepseek Chat", "Deepseek", 8000),
                model("deepseek-reasoner", "Deepseek Reasoner", "Deepseek", 8000),
            ],
            default_model: "deepseek-chat".into(),
            configurable: true,
            local: false,
            dynamic_models: false,
            api_token_key: Some("DEEPSEEK_API_KEY".into()),
            base_url_key: None,
            default_base_url: Some("https://api.deepseek.com/v1".into()),
            settings: ProviderSettings::enabled(),
        },
        ProviderDescriptor {
            name: "Ollama".into(),
            kind: ProviderKind::Ollama,
            static_models: vec![],
            default_model: String::new(),
            configurable: true,
            local: true,
            dynamic_models: true,
            api_token_key: None,
            base_url_key: Some("OLLAMA_API_BASE_URL".into()),
            default_base_url: Some("http://127.0.0.1:11434".into()),
            settings: ProviderSettings::default(),
        },
        ProviderDescriptor {
            name: "LMStudio".into(),
            kind: ProviderKind::OpenAiCompatible,
            static_models: vec![],
            default_model: String::new(),
            configurable: true,
            local: true,
            dynamic_models: true,
            api_token_key: None,
            base_url_key: Some("LMSTUDIO_API_BASE_URL".into()),
            default_base_url: Some("http://127.0.0.1:1234/v1".into()),
            settings: ProviderSettings::default(),
        },
        ProviderDescriptor {
            name: "OpenAILike".into(),
            kind: ProviderKind::OpenAiCompatible,
            static_models: vec![],
            default_model: String::new(),
            configurable: true,
            local: false,
            dynamic_models: true,
            api_token_key: Some("OPENAI_LIKE_API_KEY".into()),
            base_url_key: Some("OPENAI_LIKE_API_BASE_URL".into()),
            default_base_url: None,
            settings: ProviderSettings::default(),
        },
    ]
}

struct CachedModels {
    key: String,
    models: Vec<ModelDescriptor>,
}

/// The built-in provider list plus a cache over the dynamic model lister.
pub struct ProviderRegistry {
    providers: Vec<ProviderDescriptor>,
    default_index: usize,
    lister: Box<dyn ModelLister>,
    cache: Mutex<HashMap<String, CachedModels>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::from_providers(builtin_providers(), DEFAULT_PROVIDER)
    }

    /// `default` must name one of `providers`; otherwise the first is used.
    pub fn from_providers(providers: Vec<ProviderDescriptor>, default: &str) -> Self {
        let default_index = providers.iter().position(|p| p.name == default).unwrap_or(0);
        Self {
            providers,
            default_index,
            lister: Box::new(HttpModelLister),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the HTTP lister, e.g. with a stub in tests.
    pub fn with_lister(mut self, lister: impl ModelLister + 'static) -> Self {
        self.lister = Box::new(lister);
        self
    }

    /// Seed values for the provider settings store.
    pub fn default_settings(&self) -> BTreeMap<String, ProviderSettings> {
        self.providers
            .iter()
            .map(|p| (p.name.clone(), p.settings.clone()))
            .collect()
    }

    fn cache_key(provider: &ProviderDescriptor, credentials: &Credentials) -> String {
        format!(
            "{}|{}",
            credentials.api_key_for(provider).unwrap_or_default(),
            credentials.base_url_for(provider).unwrap_or_default()
        )
    }
}

#[async_trait]
impl ModelCatalog for ProviderRegistry {
    fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    fn default_provider(&self) -> &ProviderDescriptor {
        &self.providers[self.default_index]
    }

    async fn dynamic_models(
        &self,
        provider: &ProviderDescriptor,
        credentials: &Credentials,
    ) -> Result<Vec<ModelDescriptor>> {
        if !provider.dynamic_models {
            return Ok(Vec::new());
        }

        let key = Self::cache_key(provider, credentials);
        if let Some(cached) = self.cache.lock().get(&provider.name) {
            if cached.key == key {
                return Ok(cached.models.clone());
            }
        }

        let fetched = self.lister.list_models(provider, credentials).await?;
        let models: Vec<ModelDescriptor> = fetched
            .into_iter()
            .filter(|m| provider.find_static_model(&m.name).is_none())
            .collect();
        tracing::info!(provider = %provider.name, count = models.len(), "fetched dynamic models");

        self.cache.lock().insert(
            provider.name.clone(),
            CachedModels {
                key,
                models: models.clone(),
            },
        );
        Ok(models)
    }

    fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    fn model_instance(
        &self,
        provider: &ProviderDescriptor,
        model: &ModelDescriptor,
        credentials: &Credentials,
    ) -> Result<Box<dyn LanguageModel>, ProviderError> {
        let base_url = credentials
            .base_url_for(provider)
            .ok_or_else(|| ProviderError::MissingBaseUrl {
                provider: provider.name.clone(),
            })?;
        let api_key = credentials.api_key_for(provider);
        let missing_key = || ProviderError::MissingCredentials {
            provider: provider.name.clone(),
            key: provider
                .api_token_key
                .clone()
                .unwrap_or_else(|| "an API key".to_string()),
        };

        Ok(match provider.kind {
            ProviderKind::Anthropic => Box::new(AnthropicClient::new(
                &provider.name,
                &model.name,
                api_key.ok_or_else(missing_key)?,
                base_url,
            )),
            ProviderKind::OpenAiCompatible => {
                if api_key.is_none() && !provider.local && provider.api_token_key.is_some() {
                    return Err(missing_key());
                }
                Box::new(OpenAiCompatibleClient::new(
                    &provider.name,
                    &model.name,
                    api_key,
                    base_url,
                ))
            }
            ProviderKind::Ollama => {
                Box::new(OllamaClient::new(&provider.name, &model.name, base_url))
            }
        })
    }
}
