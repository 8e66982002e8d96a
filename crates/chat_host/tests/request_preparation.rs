use async_trait::async_trait;
use chat_host::{ChatHost, ChatRequest, FileEntry, FileMap};
use providers::model::ProviderKind;
use providers::{
    Credentials, GenerationRequest, LanguageModel, ModelCatalog, ModelDescriptor,
    ProviderDescriptor, ProviderError,
};
use shared::agent_api::{ChatMessage, ChatModeKind, StreamChunk};
use shared::settings::ProviderSettings;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

struct FakeCatalog {
    providers: Vec<ProviderDescriptor>,
}

fn provider(name: &str, models: &[(&str, u32)]) -> ProviderDescriptor {
    ProviderDescriptor {
        name: name.into(),
        kind: ProviderKind::OpenAiCompatible,
        static_models: models
            .iter()
            .map(|(m, max)| ModelDescriptor::new(m, m, name, *max))
            .collect(),
        default_model: models.first().map(|(m, _)| m.to_string()).unwrap_or_default(),
        configurable: false,
        local: false,
        dynamic_models: true,
        api_token_key: None,
        base_url_key: None,
        default_base_url: None,
        settings: ProviderSettings::enabled(),
    }
}

impl FakeCatalog {
    fn new() -> Self {
        Self {
            providers: vec![
                provider("Anthropic", &[("claude-3-5-sonnet-latest", 8000)]),
                provider("Local", &[("tiny", 0)]),
                provider("Broken", &[("fails", 1000)]),
                provider("Empty", &[]),
            ],
        }
    }
}

#[async_trait]
impl ModelCatalog for FakeCatalog {
    fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    fn default_provider(&self) -> &ProviderDescriptor {
        &self.providers[0]
    }

    async fn dynamic_models(
        &self,
        provider: &ProviderDescriptor,
        _credentials: &Credentials,
    ) -> anyhow::Result<Vec<ModelDescriptor>> {
        match provider.name.as_str() {
            "Local" => Ok(vec![ModelDescriptor::new("tiny-dyn", "tiny-dyn", "Local", 2048)]),
            _ => Ok(Vec::new()),
        }
    }

    fn model_instance(
        &self,
        provider: &ProviderDescriptor,
        model: &ModelDescriptor,
        _credentials: &Credentials,
    ) -> Result<Box<dyn LanguageModel>, ProviderError> {
        Ok(Box::new(EchoModel {
            provider: provider.name.clone(),
            model: model.name.clone(),
        }))
    }
}

/// Streams the last message back, or fails for the "fails" model.
struct EchoModel {
    provider: String,
    model: String,
}

#[async_trait]
impl LanguageModel for EchoModel {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn stream(
        &self,
        request: GenerationRequest,
        tx: UnboundedSender<StreamChunk>,
    ) -> anyhow::Result<()> {
        if self.model == "fails" {
            anyhow::bail!("connection refused");
        }
        let last = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let _ = tx.send(StreamChunk::Text(last));
        let _ = tx.send(StreamChunk::Done {
            stop_reason: Some("end_turn".into()),
        });
        Ok(())
    }
}

fn host() -> ChatHost {
    ChatHost::new(Arc::new(FakeCatalog::new()))
}

#[tokio::test]
async fn test_directives_pick_provider_and_model() {
    let request = ChatRequest {
        messages: vec![
            ChatMessage::user("hello"),
            ChatMessage::assistant("<think>hmm</think>hi"),
            ChatMessage::user("[Model: tiny-dyn]\n\n[Provider: Local]\n\nbuild a todo app"),
        ],
        ..Default::default()
    };
    let prepared = host().prepare(&request).await.unwrap();

    assert_eq!(prepared.provider, "Local");
    assert_eq!(prepared.model, "tiny-dyn");
    assert_eq!(prepared.max_tokens, 2048);
    assert_eq!(prepared.messages[1].content, "hi");
    assert_eq!(prepared.messages[2].content, "build a todo app");
    assert!(prepared.fallback_warning().is_none());
}

#[tokio::test]
async fn test_unknown_selection_falls_back() {
    let request = ChatRequest {
        provider: "Nope".into(),
        model: "missing".into(),
        messages: vec![ChatMessage::user("hi")],
        ..Default::default()
    };
    let prepared = host().prepare(&request).await.unwrap();
    assert_eq!(prepared.provider, "Anthropic");
    assert_eq!(prepared.model, "claude-3-5-sonnet-latest");
    assert!(prepared.fallback_warning().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_zero_token_limit_uses_default_cap() {
    let request = ChatRequest {
        provider: "Local".into(),
        model: "tiny".into(),
        messages: vec![ChatMessage::user("hi")],
        ..Default::default()
    };
    let prepared = host().prepare(&request).await.unwrap();
    assert_eq!(prepared.max_tokens, 8000);
}

#[tokio::test]
async fn test_empty_provider_fails() {
    let request = ChatRequest {
        provider: "Empty".into(),
        model: "x".into(),
        messages: vec![ChatMessage::user("hi")],
        ..Default::default()
    };
    let err = host().prepare(&request).await.unwrap_err();
    assert_eq!(err.to_string(), "No models found for provider Empty");
}

#[tokio::test]
async fn test_patch_mode_with_context_and_locked_files() {
    let mut files = FileMap::new();
    files.insert("/home/project/src/main.ts".into(), FileEntry::file("main"));
    files.insert("/home/project/src/config.ts".into(), FileEntry::locked_file("cfg"));
    let request = ChatRequest {
        messages: vec![
            ChatMessage::user("first"),
            ChatMessage::assistant("ok"),
            ChatMessage::user("rename the function"),
        ],
        files: files.clone(),
        context_files: files,
        summary: Some("renaming work".into()),
        chat_mode: ChatModeKind::Patch,
        context_optimization: true,
        ..Default::default()
    };
    let prepared = host().prepare(&request).await.unwrap();

    assert!(prepared.system.contains("the '/home/project' directory"));
    assert!(prepared.system.contains("CONTEXT BUFFER:"));
    assert!(prepared.system.ends_with("- /home/project/src/config.ts\n---\n"));
    assert_eq!(prepared.messages.len(), 1);
    assert_eq!(prepared.messages[0].content, "rename the function");
}

#[tokio::test]
async fn test_stream_text_delivers_chunks() {
    let request = ChatRequest {
        messages: vec![ChatMessage::user("echo me")],
        ..Default::default()
    };
    let mut stream = host().stream_text(&request).await.unwrap();
    assert_eq!(stream.prepared.model, "claude-3-5-sonnet-latest");

    stream.completion.await.unwrap().unwrap();
    assert_eq!(
        stream.chunks.recv().await,
        Some(StreamChunk::Text("echo me".into()))
    );
    assert!(matches!(
        stream.chunks.recv().await,
        Some(StreamChunk::Done { .. })
    ));
}

#[tokio::test]
async fn test_stream_failure_reports_error_chunk() {
    let request = ChatRequest {
        provider: "Broken".into(),
        model: "fails".into(),
        messages: vec![ChatMessage::user("hi")],
        ..Default::default()
    };
    let mut stream = host().stream_text(&request).await.unwrap();
    let result = stream.completion.await.unwrap();
    assert!(result.is_err());
    match stream.chunks.recv().await {
        Some(StreamChunk::Error(msg)) => assert!(msg.contains("connection refused")),
        other => panic!("expected error chunk, got {:?}", other),
    }
}
