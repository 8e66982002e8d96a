//! Provider and model resolution.
//!
//! A requested `(provider, model)` pair resolves through an ordered chain of
//! strategies: exact match in the static list, exact match in the combined
//! static + dynamic list, then the first combined entry. The chain ends in
//! [`ProviderError::NoModelsFound`] when the combined list is empty.

use crate::error::ProviderError;
use crate::model::{Credentials, ModelDescriptor, ProviderDescriptor};
use crate::registry::ModelCatalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    StaticExact,
    CombinedExact,
    FirstAvailable,
}

impl ResolutionStrategy {
    pub const CHAIN: [ResolutionStrategy; 3] = [
        ResolutionStrategy::StaticExact,
        ResolutionStrategy::CombinedExact,
        ResolutionStrategy::FirstAvailable,
    ];

    fn uses_combined_list(&self) -> bool {
        !matches!(self, ResolutionStrategy::StaticExact)
    }

    fn try_resolve(&self, name: &str, candidates: &[ModelDescriptor]) -> Option<ModelDescriptor> {
        match self {
            ResolutionStrategy::StaticExact | ResolutionStrategy::CombinedExact => {
                candidates.iter().find(|m| m.name == name).cloned()
            }
            ResolutionStrategy::FirstAvailable => candidates.first().cloned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub provider: ProviderDescriptor,
    pub model: ModelDescriptor,
    pub strategy: ResolutionStrategy,
    /// Set when the requested model was replaced by the first available one.
    pub fallback_warning: Option<String>,
}

/// Exact name match, else the catalog's default provider.
pub fn resolve_provider<'a>(catalog: &'a dyn ModelCatalog, name: &str) -> &'a ProviderDescriptor {
    match catalog.find_provider(name) {
        Some(provider) => provider,
        None => {
            let fallback = catalog.default_provider();
            tracing::debug!(requested = name, using = %fallback.name, "unknown provider, using default");
            fallback
        }
    }
}

/// Static models followed by dynamically listed ones.
///
/// A failed dynamic fetch is logged and the static list is returned alone.
pub async fn full_model_list(
    catalog: &dyn ModelCatalog,
    provider: &ProviderDescriptor,
    credentials: &Credentials,
) -> Vec<ModelDescriptor> {
    let mut models = provider.static_models.clone();
    match catalog.dynamic_models(provider, credentials).await {
        Ok(dynamic) => models.extend(dynamic),
        Err(e) => {
            tracing::warn!(provider = %provider.name, error = %e, "dynamic model listing failed, using static models");
        }
    }
    models
}

pub async fn resolve_model(
    catalog: &dyn ModelCatalog,
    provider_name: &str,
    model_name: &str,
    credentials: &Credentials,
) -> Result<Resolution, ProviderError> {
    let provider = resolve_provider(catalog, provider_name).clone();
    let mut combined: Option<Vec<ModelDescriptor>> = None;

    for strategy in ResolutionStrategy::CHAIN {
        if strategy.uses_combined_list() && combined.is_none() {
            let list = full_model_list(catalog, &provider, credentials).await;
            if list.is_empty() {
                return Err(ProviderError::NoModelsFound {
                    provider: provider.name.clone(),
                });
            }
            combined = Some(list);
        }

        let candidates: &[ModelDescriptor] = if strategy.uses_combined_list() {
            combined.as_deref().unwrap_or_default()
        } else {
            &provider.static_models
        };

        if let Some(model) = strategy.try_resolve(model_name, candidates) {
            let fallback_warning = (strategy == ResolutionStrategy::FirstAvailable).then(|| {
                format!(
                    "MODEL [{}] not found in provider [{}]. Falling back to first model. {}",
                    model_name, provider.name, model.name
                )
            });
            if let Some(warning) = &fallback_warning {
                tracing::warn!("{}", warning);
            }
            return Ok(Resolution {
                provider,
                model,
                strategy,
                fallback_warning,
            });
        }
    }

    Err(ProviderError::NoModelsFound {
        provider: provider.name,
    })
}
