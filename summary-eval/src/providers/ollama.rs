//! Ollama chat client (local model class)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::traits::{
    CompletionRequest, CompletionResponse, LLMProvider, ProviderError, ProviderResult,
};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_KEEP_ALIVE: &str = "30s";

/// Client for a local Ollama server
pub struct OllamaClient {
    base_url: String,
    http_client: Client,
    default_model: String,
    keep_alive: String,
}

impl OllamaClient {
    /// `base_url` falls back to `OLLAMA_HOST`, then `http://localhost:11434`
    pub fn new(model: impl Into<String>, base_url: Option<String>) -> Self {
        let base_url = base_url
            .or_else(|| std::env::var("OLLAMA_HOST").ok())
            .map(|url| normalize_host(&url))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self {
            base_url,
            http_client: Client::new(),
            default_model: model.into(),
            keep_alive: DEFAULT_KEEP_ALIVE.to_string(),
        }
    }

    /// How long the server keeps the model loaded after a request
    pub fn with_keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = keep_alive.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Installed model names, e.g. `llama3.2:latest`
    pub async fn list_models(&self) -> ProviderResult<Vec<String>> {
        let response = self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, message });
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("Invalid Ollama tags response: {}", e)))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn post_chat(&self, body: &OllamaChatRequest<'_>) -> ProviderResult<OllamaChatResponse> {
        let response = self
            .http_client
            .post(format!("{}/api/chat", self.base_url))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OllamaError>(&text)
                .map(|e| e.error)
                .unwrap_or(text);

            // Ollama answers 404 when the model has not been pulled
            if status == 404 {
                return Err(ProviderError::Config(format!(
                    "Ollama model {} unavailable: {}",
                    body.model, message
                )));
            }
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("Failed to parse Ollama response: {}", e)))
    }
}

/// `OLLAMA_HOST` may omit the scheme
fn normalize_host(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

/// Whether an installed tag refers to the model, treating a bare name as `:latest`
fn tag_matches(tag: &str, model: &str) -> bool {
    tag == model || (!model.contains(':') && tag == format!("{}:latest", model))
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    model: String,
    message: OllamaResponseMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct OllamaError {
    error: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

#[async_trait]
impl LLMProvider for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
        let start = Instant::now();
        let model = request.model.as_deref().unwrap_or(&self.default_model);

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system_prompt {
            messages.push(OllamaMessage {
                role: "system",
                content: system,
            });
        }
        messages.extend(request.messages.iter().map(|m| OllamaMessage {
            role: &m.role,
            content: &m.content,
        }));

        let body = OllamaChatRequest {
            model,
            messages,
            stream: false,
            keep_alive: Some(self.keep_alive.as_str()),
            options: Some(OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            }),
        };

        let response = self.post_chat(&body).await?;
        let latency_ms = start.elapsed().as_millis() as u64;

        Ok(CompletionResponse {
            content: response.message.content,
            model: if response.model.is_empty() {
                model.to_string()
            } else {
                response.model
            },
            input_tokens: response.prompt_eval_count,
            output_tokens: response.eval_count,
            finish_reason: response.done_reason.unwrap_or_else(|| "stop".to_string()),
            latency_ms,
        })
    }

    /// An empty chat loads the model into memory without generating
    async fn warm_up(&self) -> ProviderResult<()> {
        let body = OllamaChatRequest {
            model: &self.default_model,
            messages: Vec::new(),
            stream: false,
            keep_alive: Some(self.keep_alive.as_str()),
            options: None,
        };
        self.post_chat(&body).await?;
        tracing::debug!("Warmed up {} (keep_alive={})", self.default_model, self.keep_alive);
        Ok(())
    }

    async fn health_check(&self) -> ProviderResult<bool> {
        match self.list_models().await {
            Ok(models) => Ok(models.iter().any(|m| tag_matches(m, &self.default_model))),
            Err(e) => {
                tracing::debug!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }
}
