//! OpenRouter client speaking the OpenAI chat-completions protocol

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::traits::{
    CompletionRequest, CompletionResponse, LLMProvider, Message, ProviderError, ProviderResult,
    ResponseFormat,
};
use crate::config::{ProviderConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};

const DEFAULT_TIMEOUT_MS: u64 = 120_000;
const APP_TITLE: &str = "rubric-eval";

/// Client for any OpenAI-compatible `/chat/completions` endpoint
pub struct OpenRouterClient {
    /// Sent as a bearer token when present; a missing key surfaces as a 401
    api_key: Option<String>,
    base_url: String,
    http_client: Client,
    default_model: String,
    timeout_ms: u64,
}

impl OpenRouterClient {
    /// Create a new client against the public OpenRouter endpoint
    pub fn new(api_key: Option<String>) -> ProviderResult<Self> {
        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http_client: build_http_client(DEFAULT_TIMEOUT_MS)?,
            default_model: DEFAULT_MODEL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        })
    }

    /// Create from provider settings
    pub fn from_config(config: &ProviderConfig, api_key: Option<String>) -> ProviderResult<Self> {
        Self::new(api_key)?
            .with_base_url(&config.base_url)
            .with_model(&config.model)
            .with_timeout_ms(config.timeout_ms)
    }

    /// Set custom base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set default model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the whole-request timeout
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> ProviderResult<Self> {
        self.http_client = build_http_client(timeout_ms)?;
        self.timeout_ms = timeout_ms;
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn build_http_client(timeout_ms: u64) -> ProviderResult<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()?)
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'a ResponseFormat>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.clone(),
            content: Some(msg.content.clone()),
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[async_trait]
impl LLMProvider for OpenRouterClient {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
        let start = Instant::now();

        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        let body = ChatRequest {
            model,
            messages: request.messages.iter().map(ChatMessage::from).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request.response_format.as_ref(),
        };

        let mut builder = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json")
            .header("X-Title", APP_TITLE)
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| self.map_transport(e))?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let status = response.status();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60)
                * 1000;
            return Err(ProviderError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiError>(&body) {
                Ok(error) => error.error.message,
                Err(_) => format!("HTTP {}: {}", status.as_u16(), body),
            };

            if status == 401 || status == 403 {
                return Err(ProviderError::Auth {
                    status: status.as_u16(),
                    message,
                });
            }

            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let api_response: ChatResponse = response.json().await.map_err(|e| self.map_transport(e))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Parse("No choices in response".to_string()))?;

        let content = choice
            .message
            .content
            .ok_or_else(|| ProviderError::Parse("Empty message content".to_string()))?;

        let (input_tokens, output_tokens) = api_response
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        let model = api_response
            .model
            .unwrap_or_else(|| body.model.clone());

        tracing::debug!(
            model = %model,
            latency_ms,
            input_tokens,
            output_tokens,
            "completion received"
        );

        Ok(CompletionResponse {
            content,
            model,
            input_tokens,
            output_tokens,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "unknown".to_string()),
            latency_ms,
        })
    }
}

impl OpenRouterClient {
    fn map_transport(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout {
                timeout_ms: self.timeout_ms,
            }
        } else if err.is_decode() {
            ProviderError::Parse(err.to_string())
        } else {
            ProviderError::Http(err)
        }
    }
}
