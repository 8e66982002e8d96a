//! Background model calls.
//!
//! Each job runs on its own thread with a tokio runtime and reports back to
//! the UI over a std channel.

use chat_host::{ChatHost, ChatRequest};
use eframe::egui;
use providers::{Credentials, ModelDescriptor};
use shared::agent_api::StreamChunk;
use std::sync::mpsc::Sender;
use std::sync::Arc;

#[derive(Debug)]
pub enum WorkerEvent {
    Models {
        provider: String,
        models: Vec<ModelDescriptor>,
    },
    Prepared {
        request_id: String,
        provider: String,
        model: String,
        system: String,
        warning: Option<String>,
    },
    Chunk {
        request_id: String,
        chunk: StreamChunk,
    },
    Finished {
        request_id: String,
        error: Option<String>,
    },
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

pub fn refresh_models(
    host: Arc<ChatHost>,
    provider: String,
    credentials: Credentials,
    tx: Sender<WorkerEvent>,
    ctx: egui::Context,
) {
    std::thread::spawn(move || {
        let rt = match runtime() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!(error = %e, "failed to start async runtime");
                return;
            }
        };
        let models = rt.block_on(host.model_list(&provider, &credentials));
        tracing::debug!(provider = %provider, count = models.len(), "model list refreshed");
        let _ = tx.send(WorkerEvent::Models { provider, models });
        ctx.request_repaint();
    });
}

pub fn run_chat(
    host: Arc<ChatHost>,
    request_id: String,
    request: ChatRequest,
    tx: Sender<WorkerEvent>,
    ctx: egui::Context,
) {
    std::thread::spawn(move || {
        let finish = |error: Option<String>| {
            let _ = tx.send(WorkerEvent::Finished {
                request_id: request_id.clone(),
                error,
            });
            ctx.request_repaint();
        };

        let rt = match runtime() {
            Ok(rt) => rt,
            Err(e) => {
                finish(Some(format!("Failed to start async runtime: {}", e)));
                return;
            }
        };

        let result: anyhow::Result<()> = rt.block_on(async {
            let mut stream = host.stream_text(&request).await?;
            let _ = tx.send(WorkerEvent::Prepared {
                request_id: request_id.clone(),
                provider: stream.prepared.provider.clone(),
                model: stream.prepared.model.clone(),
                system: stream.prepared.system.clone(),
                warning: stream.prepared.fallback_warning().map(str::to_string),
            });

            while let Some(chunk) = stream.chunks.recv().await {
                let _ = tx.send(WorkerEvent::Chunk {
                    request_id: request_id.clone(),
                    chunk,
                });
                ctx.request_repaint();
            }
            stream.completion.await??;
            Ok(())
        });

        finish(result.err().map(|e| e.to_string()));
    });
}
