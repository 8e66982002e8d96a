//! Turns a chat request into a resolved model call.
//!
//! `prepare` runs preprocess → resolve → assemble. `stream_text` prepares the
//! request, creates the model instance and spawns the streaming call.

use crate::assembler::{assemble, ChatMode, PromptContext};
use crate::context::{FileMap, WORK_DIR};
use crate::preprocess::preprocess_messages;
use crate::prompts::{DesignScheme, PromptLibrary, SupabaseContext};
use providers::model::DEFAULT_MAX_TOKENS;
use providers::{
    full_model_list, resolve_model, resolve_provider, Credentials, GenerationRequest,
    ModelCatalog, ModelDescriptor, ProviderError, Resolution,
};
use shared::agent_api::{ChatMessage, ChatModeKind, StreamChunk};
use shared::settings::{ProviderSettings, SettingsStores, DEFAULT_MODEL, DEFAULT_PROVIDER};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Current selection; directives in user messages override it.
    pub provider: String,
    pub model: String,
    pub api_keys: HashMap<String, String>,
    pub provider_settings: BTreeMap<String, ProviderSettings>,
    pub server_env: HashMap<String, String>,
    pub prompt_id: String,
    pub files: FileMap,
    pub context_files: FileMap,
    pub summary: Option<String>,
    pub message_slice_id: Option<usize>,
    pub chat_mode: ChatModeKind,
    pub design_scheme: Option<DesignScheme>,
    pub database: Option<SupabaseContext>,
    pub context_optimization: bool,
    pub cwd: String,
}

impl Default for ChatRequest {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            provider: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_keys: HashMap::new(),
            provider_settings: BTreeMap::new(),
            server_env: HashMap::new(),
            prompt_id: PromptLibrary::DEFAULT_ID.to_string(),
            files: FileMap::new(),
            context_files: FileMap::new(),
            summary: None,
            message_slice_id: None,
            chat_mode: ChatModeKind::Build,
            design_scheme: None,
            database: None,
            context_optimization: false,
            cwd: WORK_DIR.to_string(),
        }
    }
}

impl ChatRequest {
    /// Request seeded from the persisted selection and preferences.
    pub fn from_settings(stores: &SettingsStores, messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            provider: stores.selected_provider.get(),
            model: stores.selected_model.get(),
            provider_settings: stores.providers.get(),
            prompt_id: stores.prompt_id.get(),
            context_optimization: stores.context_optimization.get(),
            ..Default::default()
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            api_keys: self.api_keys.clone(),
            provider_settings: self.provider_settings.clone(),
            server_env: self.server_env.clone(),
        }
    }

    pub fn mode(&self) -> ChatMode {
        match self.chat_mode {
            ChatModeKind::Build => ChatMode::Build {
                prompt_id: self.prompt_id.clone(),
                design_scheme: self.design_scheme.clone(),
                database: self.database.clone(),
            },
            ChatModeKind::Discuss => ChatMode::Discuss,
            ChatModeKind::Patch => ChatMode::Patch {
                cwd: self.cwd.clone(),
            },
        }
    }

    fn prompt_context(&self) -> PromptContext {
        PromptContext {
            cwd: self.cwd.clone(),
            files: self.files.clone(),
            context_files: self.context_files.clone(),
            summary: self.summary.clone(),
            message_slice_id: self.message_slice_id,
            context_optimization: self.context_optimization,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub system: String,
    pub provider: String,
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage>,
    pub resolution: Resolution,
}

impl PreparedRequest {
    pub fn generation_request(&self) -> GenerationRequest {
        GenerationRequest {
            system: self.system.clone(),
            messages: self.messages.clone(),
            max_tokens: self.max_tokens,
        }
    }

    pub fn fallback_warning(&self) -> Option<&str> {
        self.resolution.fallback_warning.as_deref()
    }
}

/// A running model call.
pub struct StreamText {
    pub prepared: PreparedRequest,
    pub chunks: UnboundedReceiver<StreamChunk>,
    pub completion: JoinHandle<anyhow::Result<()>>,
}

pub fn token_cap(model: &ModelDescriptor) -> u32 {
    if model.max_token_allowed > 0 {
        model.max_token_allowed
    } else {
        DEFAULT_MAX_TOKENS
    }
}

pub struct ChatHost {
    catalog: Arc<dyn ModelCatalog>,
    library: PromptLibrary,
}

impl ChatHost {
    pub fn new(catalog: Arc<dyn ModelCatalog>) -> Self {
        Self {
            catalog,
            library: PromptLibrary::new(),
        }
    }

    pub fn catalog(&self) -> &dyn ModelCatalog {
        self.catalog.as_ref()
    }

    pub fn library(&self) -> &PromptLibrary {
        &self.library
    }

    /// Static plus dynamic models for a provider, for the selector.
    pub async fn model_list(&self, provider: &str, credentials: &Credentials) -> Vec<ModelDescriptor> {
        let catalog = self.catalog.as_ref();
        let descriptor = resolve_provider(catalog, provider);
        full_model_list(catalog, descriptor, credentials).await
    }

    pub async fn prepare(&self, request: &ChatRequest) -> Result<PreparedRequest, ProviderError> {
        let pre = preprocess_messages(request.messages.clone());
        let provider_name = pre.provider.as_deref().unwrap_or(&request.provider);
        let model_name = pre.model.as_deref().unwrap_or(&request.model);

        let resolution = resolve_model(
            self.catalog.as_ref(),
            provider_name,
            model_name,
            &request.credentials(),
        )
        .await?;

        let mode = request.mode();
        let assembled = assemble(
            &self.library,
            &mode,
            &request.prompt_context(),
            pre.messages,
        );
        let max_tokens = token_cap(&resolution.model);

        tracing::info!(
            provider = %resolution.provider.name,
            model = %resolution.model.name,
            mode = mode.kind().as_str(),
            max_tokens,
            messages = assembled.messages.len(),
            "prepared chat request"
        );

        Ok(PreparedRequest {
            system: assembled.system,
            provider: resolution.provider.name.clone(),
            model: resolution.model.name.clone(),
            max_tokens,
            messages: assembled.messages,
            resolution,
        })
    }

    pub async fn stream_text(&self, request: &ChatRequest) -> Result<StreamText, ProviderError> {
        let prepared = self.prepare(request).await?;
        let model = self.catalog.model_instance(
            &prepared.resolution.provider,
            &prepared.resolution.model,
            &request.credentials(),
        )?;

        let (tx, chunks) = mpsc::unbounded_channel();
        let generation = prepared.generation_request();
        let completion = tokio::spawn(async move {
            let result = model.stream(generation, tx.clone()).await;
            if let Err(e) = &result {
                tracing::error!(provider = model.provider_name(), model = model.model_name(), error = %e, "model call failed");
                let _ = tx.send(StreamChunk::Error(e.to_string()));
            }
            result
        });

        Ok(StreamText {
            prepared,
            chunks,
            completion,
        })
    }
}
