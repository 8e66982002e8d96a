use crate::client::{error_detail, is_reasoning_model, GenerationRequest, LanguageModel, SHARED_HTTP};
use crate::model::{ModelDescriptor, DEFAULT_MAX_TOKENS};
use crate::sse::SseParser;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::agent_api::StreamChunk;
use tokio::sync::mpsc::UnboundedSender;

// ── Request types ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

// ── Streaming response types ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

// ── Model listing ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    /// OpenRouter-style listings carry a display name.
    #[serde(default)]
    name: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Client for any endpoint speaking the OpenAI chat-completions protocol.
pub struct OpenAiCompatibleClient {
    http: Client,
    provider: String,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenAiCompatibleClient {
    /// `base_url` includes the version segment, e.g. `https://api.openai.com/v1`.
    pub fn new(provider: &str, model: &str, api_key: Option<String>, base_url: String) -> Self {
        Self {
            http: SHARED_HTTP.clone(),
            provider: provider.to_string(),
            api_key,
            base_url,
            model: model.to_string(),
        }
    }

    pub async fn list_models(
        provider: &str,
        api_key: Option<&str>,
        base_url: &str,
    ) -> Result<Vec<ModelDescriptor>> {
        let mut req = SHARED_HTTP.get(format!("{}/models", base_url));
        if let Some(key) = api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(error_detail(provider, resp).await);
        }
        let body: ModelsResponse = resp.json().await?;
        Ok(body
            .data
            .into_iter()
            .map(|m| {
                let label = m.name.unwrap_or_else(|| m.id.clone());
                ModelDescriptor::new(&m.id, &label, provider, DEFAULT_MAX_TOKENS)
            })
            .collect())
    }

    fn build_request<'a>(&'a self, request: &'a GenerationRequest) -> ChatCompletionRequest<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system.trim().is_empty() {
            messages.push(WireMessage {
                role: "system",
                content: &request.system,
            });
        }
        messages.extend(request.messages.iter().map(|m| WireMessage {
            role: m.role.as_str(),
            content: &m.content,
        }));

        let reasoning = is_reasoning_model(&self.model);
        ChatCompletionRequest {
            model: &self.model,
            messages,
            stream: true,
            max_tokens: (!reasoning).then_some(request.max_tokens),
            max_completion_tokens: reasoning.then_some(request.max_tokens),
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleClient {
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
    ) -> Result<()> {
        let req = self.build_request(&request);
        let mut http_req = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json")
            .json(&req);
        if let Some(key) = &self.api_key {
            http_req = http_req.bearer_auth(key);
        }
        let resp = http_req.send().await?;
        if !resp.status().is_success() {
            return Err(error_detail(&self.provider, resp).await);
        }

        let mut parser = SseParser::new();
        let mut stream = resp.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| anyhow!("stream read error: {}", e))?;
            for event in parser.feed(&bytes) {
                if event.data == "[DONE]" {
                    let _ = tx.send(StreamChunk::Done { stop_reason: None });
                    return Ok(());
                }
                // Unparseable lines (keepalives, comments) are skipped
                let Ok(resp) = serde_json::from_str::<StreamResponse>(&event.data) else {
                    continue;
                };
                let Some(choice) = resp.choices.into_iter().next() else {
                    continue;
                };
                if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                    let _ = tx.send(StreamChunk::Text(content));
                }
                if let Some(reason) = choice.finish_reason {
                    let _ = tx.send(StreamChunk::Done {
                        stop_reason: Some(reason),
                    });
                    return Ok(());
                }
            }
        }

        let _ = tx.send(StreamChunk::Done { stop_reason: None });
        Ok(())
    }
}
