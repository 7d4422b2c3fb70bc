//! LLM Provider implementations

pub mod ollama;
pub mod openai;
pub mod traits;

pub use ollama::OllamaClient;
pub use openai::OpenAIClient;
pub use traits::{
    CompletionRequest, CompletionResponse, LLMProvider, Message, ProviderError, ProviderResult,
};

use crate::config::{Config, EndpointConfig, ModelClass, ModelConfig};
use crate::runner::rate_limiter::RateLimiter;
use std::sync::Arc;

/// Shared provider handle
pub type SharedProvider = Arc<dyn LLMProvider + Send + Sync>;

/// Create the provider for one model with its own request limiter
pub fn create_provider(
    model: &ModelConfig,
    endpoints: &EndpointConfig,
) -> ProviderResult<SharedProvider> {
    let limiter = Arc::new(RateLimiter::new(endpoints.openai_rpm));
    create_provider_with_limiter(model, endpoints, &limiter)
}

fn create_provider_with_limiter(
    model: &ModelConfig,
    endpoints: &EndpointConfig,
    limiter: &Arc<RateLimiter>,
) -> ProviderResult<SharedProvider> {
    match model.class {
        ModelClass::Hosted => {
            let client = OpenAIClient::from_env(&endpoints.openai_api_key_env)?
                .with_base_url(&endpoints.openai_base_url)
                .with_rate_limiter(Arc::clone(limiter))
                .with_model(&model.id);
            Ok(Arc::new(client))
        }
        ModelClass::Local => {
            let client = OllamaClient::new(&model.id, endpoints.ollama_base_url.clone())
                .with_keep_alive(&endpoints.ollama_keep_alive);
            Ok(Arc::new(client))
        }
    }
}

/// Create providers for every configured model, in configuration order.
/// Hosted models share one request limiter since they hit the same API.
pub fn create_providers_with_config(
    config: &Config,
) -> ProviderResult<Vec<(ModelConfig, SharedProvider)>> {
    let limiter = Arc::new(RateLimiter::new(config.endpoints.openai_rpm));

    config
        .models
        .iter()
        .map(|model| {
            let provider = create_provider_with_limiter(model, &config.endpoints, &limiter)?;
            Ok((model.clone(), provider))
        })
        .collect()
}

/// Create the judge provider, or `None` when judging is disabled
pub fn create_judge_provider(config: &Config) -> ProviderResult<Option<SharedProvider>> {
    if !config.judge.enabled {
        return Ok(None);
    }
    create_provider(&config.judge.model_config(), &config.endpoints).map(Some)
}
