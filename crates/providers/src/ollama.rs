use crate::client::{error_detail, GenerationRequest, LanguageModel, SHARED_HTTP};
use crate::model::{ModelDescriptor, DEFAULT_MAX_TOKENS};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::agent_api::StreamChunk;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

/// Streaming response: each line is one of these JSON objects.
#[derive(Debug, Deserialize)]
struct OllamaStreamChunk {
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
    #[serde(default)]
    details: Option<TagDetails>,
}

#[derive(Debug, Deserialize)]
struct TagDetails {
    #[serde(default)]
    parameter_size: Option<String>,
}

pub struct OllamaClient {
    http: Client,
    provider: String,
    base: String,
    model: String,
}

impl OllamaClient {
    pub fn new(provider: &str, model: &str, base: String) -> Self {
        Self {
            http: SHARED_HTTP.clone(),
            provider: provider.to_string(),
            base,
            model: model.to_string(),
        }
    }

    pub async fn list_models(provider: &str, base: &str) -> Result<Vec<ModelDescriptor>> {
        let resp = SHARED_HTTP.get(format!("{}/api/tags", base)).send().await?;
        if !resp.status().is_success() {
            return Err(error_detail("ollama", resp).await);
        }
        let body: TagsResponse = resp.json().await?;
        Ok(body
            .models
            .into_iter()
            .map(|m| {
                let label = match m.details.and_then(|d| d.parameter_size) {
                    Some(size) => format!("{} ({})", m.name, size),
                    None => m.name.clone(),
                };
                ModelDescriptor::new(&m.name, &label, provider, DEFAULT_MAX_TOKENS)
            })
            .collect())
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
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
        let mut conversation = Vec::with_capacity(request.messages.len() + 1);
        if !request.system.trim().is_empty() {
            conversation.push(OllamaMessage {
                role: "system".into(),
                content: request.system,
            });
        }
        conversation.extend(request.messages.into_iter().map(|m| OllamaMessage {
            role: m.role.as_str().to_string(),
            content: m.content,
        }));

        let req = OllamaChatRequest {
            model: &self.model,
            messages: conversation,
            stream: true,
            options: OllamaOptions {
                num_predict: request.max_tokens,
            },
        };
        let resp = self
            .http
            .post(format!("{}/api/chat", self.base))
            .json(&req)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(error_detail("ollama", resp).await);
        }

        // Ollama streams line-delimited JSON
        let mut stream = resp.bytes_stream();
        let mut buf = String::new();

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| anyhow!("stream read error: {}", e))?;
            buf.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(pos) = buf.find('\n') {
                let line: String = buf.drain(..=pos).collect();
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match serde_json::from_str::<OllamaStreamChunk>(line) {
                    Ok(chunk_data) => {
                        if let Some(msg) = chunk_data.message.filter(|m| !m.content.is_empty()) {
                            let _ = tx.send(StreamChunk::Text(msg.content));
                        }
                        if chunk_data.done {
                            let _ = tx.send(StreamChunk::Done {
                                stop_reason: chunk_data.done_reason,
                            });
                            return Ok(());
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(StreamChunk::Error(format!(
                            "Failed to parse Ollama stream: {}",
                            e
                        )));
                        return Ok(());
                    }
                }
            }
        }

        let _ = tx.send(StreamChunk::Done { stop_reason: None });
        Ok(())
    }
}
