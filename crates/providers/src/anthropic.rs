use crate::client::{error_detail, GenerationRequest, LanguageModel, SHARED_HTTP};
use crate::model::{ModelDescriptor, DEFAULT_MAX_TOKENS};
use crate::sse::SseParser;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::agent_api::{Role, StreamChunk};
use tokio::sync::mpsc::UnboundedSender;

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta { delta: Delta },
    MessageDelta { delta: MessageDelta },
    MessageStop,
    Error { error: ApiError },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
}

pub struct AnthropicClient {
    http: Client,
    provider: String,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(provider: &str, model: &str, api_key: String, base_url: String) -> Self {
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
        api_key: &str,
        base_url: &str,
    ) -> Result<Vec<ModelDescriptor>> {
        let resp = SHARED_HTTP
            .get(format!("{}/v1/models", base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(error_detail("anthropic", resp).await);
        }
        let body: ModelsResponse = resp.json().await?;
        Ok(body
            .data
            .into_iter()
            .map(|m| {
                let label = m.display_name.unwrap_or_else(|| m.id.clone());
                ModelDescriptor::new(&m.id, &label, provider, DEFAULT_MAX_TOKENS)
            })
            .collect())
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
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
        // System prompt travels separately; stray system messages join it.
        let mut system = request.system.clone();
        let mut messages = Vec::new();
        for m in &request.messages {
            match m.role {
                Role::System => {
                    if !system.is_empty() {
                        system.push_str("\n\n");
                    }
                    system.push_str(&m.content);
                }
                role => messages.push(AnthropicMessage {
                    role: role.as_str(),
                    content: &m.content,
                }),
            }
        }

        let req = AnthropicRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            system: if system.trim().is_empty() {
                None
            } else {
                Some(system.as_str())
            },
            messages,
            stream: true,
        };

        let resp = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&req)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(error_detail("anthropic", resp).await);
        }

        let mut parser = SseParser::new();
        let mut stream = resp.bytes_stream();
        let mut stop_reason = None;

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| anyhow!("stream read error: {}", e))?;
            for event in parser.feed(&bytes) {
                match serde_json::from_str::<StreamEvent>(&event.data) {
                    Ok(StreamEvent::ContentBlockDelta { delta }) => {
                        if let Some(text) = delta.text.filter(|t| !t.is_empty()) {
                            let _ = tx.send(StreamChunk::Text(text));
                        }
                    }
                    Ok(StreamEvent::MessageDelta { delta }) => {
                        if delta.stop_reason.is_some() {
                            stop_reason = delta.stop_reason;
                        }
                    }
                    Ok(StreamEvent::MessageStop) => {
                        let _ = tx.send(StreamChunk::Done { stop_reason });
                        return Ok(());
                    }
                    Ok(StreamEvent::Error { error }) => {
                        let _ = tx.send(StreamChunk::Error(error.message));
                        return Ok(());
                    }
                    Ok(StreamEvent::Other) | Err(_) => {}
                }
            }
        }

        let _ = tx.send(StreamChunk::Done { stop_reason });
        Ok(())
    }
}
