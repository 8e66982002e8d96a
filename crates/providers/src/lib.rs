//! Provider registry, model resolution and streaming chat clients.

pub mod anthropic;
pub mod client;
pub mod error;
pub mod model;
pub mod ollama;
pub mod openai;
pub mod registry;
pub mod resolver;
pub mod sse;

pub use client::{GenerationRequest, LanguageModel};
pub use error::ProviderError;
pub use model::{Credentials, ModelDescriptor, ProviderDescriptor, ProviderKind};
pub use registry::{HttpModelLister, ModelCatalog, ModelLister, ProviderRegistry};
pub use resolver::{full_model_list, resolve_model, resolve_provider, Resolution, ResolutionStrategy};
