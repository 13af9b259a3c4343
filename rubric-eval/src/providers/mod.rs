//! Chat-completion provider implementations

pub mod openrouter;
pub mod traits;

pub use openrouter::OpenRouterClient;
pub use traits::{
    CompletionRequest, CompletionResponse, JsonSchemaFormat, LLMProvider, Message,
    ProviderError, ProviderResult, ResponseFormat,
};

use crate::config::{Config, Credentials};

/// Create the configured provider
pub fn create_provider(config: &Config, credentials: &Credentials) -> ProviderResult<OpenRouterClient> {
    match config.provider.name.to_lowercase().as_str() {
        "openrouter" | "openai" => {
            if credentials.provider_api_key.is_none() {
                tracing::warn!(
                    "{} not set; requests will be sent unauthenticated",
                    config.provider.api_key_env
                );
            }
            OpenRouterClient::from_config(&config.provider, credentials.provider_api_key.clone())
        }
        other => Err(ProviderError::Config(format!("Unknown provider: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_without_key() {
        let config = Config::default();
        let provider = create_provider(&config, &Credentials::default()).unwrap();
        assert_eq!(provider.default_model(), "openai/gpt-4o");
    }

    #[test]
    fn test_create_unknown_provider() {
        let mut config = Config::default();
        config.provider.name = "carrier-pigeon".to_string();
        let err = create_provider(&config, &Credentials::default()).err().unwrap();
        assert!(err.to_string().contains("Unknown provider"));
    }
}
