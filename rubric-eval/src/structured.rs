//! Structured output over a chat-completion provider
//!
//! [`StructuredClient`] asks the model for a JSON instance of a target type,
//! deserializes the reply, validates it, and on failure re-asks with the
//! validation error attached. Transport failures are never retried.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::config::{ProviderConfig, ResponseMode};
use crate::providers::{
    CompletionRequest, JsonSchemaFormat, LLMProvider, Message, ProviderError, ResponseFormat,
};
use crate::rubric::SchemaError;

/// A type the model can be asked to produce
pub trait StructuredResponse: DeserializeOwned + Sized {
    /// Schema name sent on the wire
    const NAME: &'static str;

    /// JSON Schema describing the expected reply
    fn json_schema() -> Value;

    /// Constraints beyond what deserialization enforces
    fn validate(&self) -> Result<(), SchemaError>;

    /// Extract, deserialize and validate a raw reply
    fn parse_reply(text: &str) -> Result<Self, SchemaError> {
        let value: Self = serde_json::from_str(extract_json(text))?;
        value.validate()?;
        Ok(value)
    }
}

/// Structured-output errors
#[derive(Debug, thiserror::Error)]
pub enum StructuredError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("reply failed schema validation after {attempts} attempt(s): {last_error}")]
    Exhausted {
        attempts: u32,
        #[source]
        last_error: SchemaError,
    },
}

/// Chat-completion wrapper that returns validated, typed replies
pub struct StructuredClient {
    provider: Arc<dyn LLMProvider>,
    model: Option<String>,
    mode: ResponseMode,
    max_attempts: u32,
    max_tokens: Option<u32>,
}

impl StructuredClient {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            model: None,
            mode: ResponseMode::default(),
            max_attempts: 3,
            max_tokens: None,
        }
    }

    /// Create from provider settings
    pub fn from_config(provider: Arc<dyn LLMProvider>, config: &ProviderConfig) -> Self {
        let client = Self::new(provider)
            .with_model(&config.model)
            .with_mode(config.response_mode)
            .with_max_attempts(config.max_attempts);
        match config.max_tokens {
            Some(max_tokens) => client.with_max_tokens(max_tokens),
            None => client,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_mode(mut self, mode: ResponseMode) -> Self {
        self.mode = mode;
        self
    }

    /// Total attempts including the first request; at least one is always made
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Request a `T` from the model
    pub async fn create<T: StructuredResponse>(
        &self,
        messages: Vec<Message>,
        temperature: f32,
    ) -> Result<T, StructuredError> {
        let mut messages = with_schema_instruction::<T>(messages);
        let format = self.response_format::<T>();

        let mut attempt = 1;
        loop {
            let mut request = CompletionRequest::new(messages.clone())
                .with_temperature(temperature)
                .with_response_format(format.clone());
            if let Some(model) = &self.model {
                request = request.with_model(model);
            }
            if let Some(max_tokens) = self.max_tokens {
                request = request.with_max_tokens(max_tokens);
            }

            let response = self.provider.complete(&request).await?;

            match T::parse_reply(&response.content) {
                Ok(value) => {
                    tracing::debug!(schema = T::NAME, attempt, "reply validated");
                    return Ok(value);
                }
                Err(e) if attempt >= self.max_attempts => {
                    return Err(StructuredError::Exhausted {
                        attempts: attempt,
                        last_error: e,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        "{} reply failed validation (attempt {}/{}): {}",
                        T::NAME,
                        attempt,
                        self.max_attempts,
                        e
                    );
                    messages.push(Message::assistant(response.content));
                    messages.push(Message::user(reask_message(&e)));
                    attempt += 1;
                }
            }
        }
    }

    fn response_format<T: StructuredResponse>(&self) -> ResponseFormat {
        match self.mode {
            ResponseMode::JsonObject => ResponseFormat::JsonObject,
            ResponseMode::JsonSchema => ResponseFormat::JsonSchema {
                json_schema: JsonSchemaFormat {
                    name: T::NAME.to_string(),
                    strict: false,
                    schema: T::json_schema(),
                },
            },
        }
    }
}

/// Instruction telling the model which JSON shape to return
pub fn schema_instruction<T: StructuredResponse>() -> String {
    let schema = serde_json::to_string_pretty(&T::json_schema()).unwrap_or_default();
    format!(
        "Respond with a single JSON object that is an instance of the `{}` schema below. \
         Return the data itself, not the schema, and no text outside the JSON.\n\n```json\n{}\n```",
        T::NAME,
        schema
    )
}

/// Append the schema instruction to the system message, adding one if absent
fn with_schema_instruction<T: StructuredResponse>(mut messages: Vec<Message>) -> Vec<Message> {
    let instruction = schema_instruction::<T>();
    match messages.iter_mut().find(|m| m.role == "system") {
        Some(system) => {
            system.content.push_str("\n\n");
            system.content.push_str(&instruction);
        }
        None => messages.insert(0, Message::system(instruction)),
    }
    messages
}

fn reask_message(error: &SchemaError) -> String {
    format!(
        "The previous reply did not match the required schema: {}\n\
         Fix the errors and respond again with only the corrected JSON object.",
        error
    )
}

/// Extract the JSON payload from a reply, tolerating code fences and prose
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    // A bare JSON reply may itself contain fences inside string values
    if (trimmed.starts_with('{') || trimmed.starts_with('[')) && is_json(trimmed) {
        return trimmed;
    }

    if let Some(inner) = fenced_block(trimmed, "```json") {
        if is_json(inner) {
            return inner;
        }
    }
    if let Some(inner) = fenced_block(trimmed, "```") {
        if (inner.starts_with('{') || inner.starts_with('[')) && is_json(inner) {
            return inner;
        }
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

fn is_json(text: &str) -> bool {
    serde_json::from_str::<serde::de::IgnoredAny>(text).is_ok()
}

fn fenced_block<'a>(text: &'a str, fence: &str) -> Option<&'a str> {
    let start = text.find(fence)? + fence.len();
    let after = &text[start..];
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}
