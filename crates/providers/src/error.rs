#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("No models found for provider {provider}")]
    NoModelsFound { provider: String },

    #[error("Missing credentials for {provider}: set {key} or add a key in settings")]
    MissingCredentials { provider: String, key: String },

    #[error("No base URL configured for {provider}")]
    MissingBaseUrl { provider: String },
}
