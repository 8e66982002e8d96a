use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use shared::agent_api::{ChatMessage, StreamChunk};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

pub(crate) static SHARED_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

/// A concrete model instance able to stream a chat completion.
///
/// Contract: if the connection fails before any chunk is sent, `stream`
/// returns `Err`. Once streaming starts, errors go through
/// `StreamChunk::Error` and the call returns `Ok(())`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn provider_name(&self) -> &str;
    fn model_name(&self) -> &str;
    async fn stream(&self, request: GenerationRequest, tx: UnboundedSender<StreamChunk>)
        -> Result<()>;
}

/// Reasoning models take `max_completion_tokens` instead of `max_tokens`.
pub fn is_reasoning_model(model: &str) -> bool {
    let name = model.rsplit('/').next().unwrap_or(model);
    ["o1", "o3", "o4", "gpt-5"]
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// Read at most 800 chars of an error body for diagnostics.
pub(crate) async fn error_detail(provider: &str, resp: reqwest::Response) -> anyhow::Error {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let detail: String = body.chars().take(800).collect();
    if detail.trim().is_empty() {
        anyhow::anyhow!("{} error: {}", provider, status)
    } else {
        anyhow::anyhow!("{} error: {}\n{}", provider, status, detail)
    }
}
