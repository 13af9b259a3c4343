//! Evaluation request builder

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, ConfigError, Credentials};
use crate::prompt::{PromptError, PromptTemplate};
use crate::providers::{create_provider, ProviderError};
use crate::rubric::Rubric;
use crate::structured::{StructuredClient, StructuredError};

/// Sampling temperature for rubric generation
pub const EVALUATION_TEMPERATURE: f32 = 0.7;

/// Task prompt evaluated when the caller supplies none
pub const SAMPLE_PROMPT: &str = "Given a Hypertensive CKD patient with Heart Failure and declining kidney function and hypokalemia, provide a care plan to improve their health.";

/// Candidate response evaluated when the caller supplies none
pub const SAMPLE_RESPONSE: &str = "The patient should receive a beta blockers, low-salt diet, diuretics, and potassium supplements. No further action is needed because this already addresses all their needs.";

/// Errors on the evaluation path; all of them abort the run
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Structured(#[from] StructuredError),

    #[error("failed to read input {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Builds the evaluation conversation and requests a [`Rubric`] for it
pub struct RubricGenerator {
    client: StructuredClient,
    template: PromptTemplate,
    temperature: f32,
}

impl RubricGenerator {
    pub fn new(client: StructuredClient, template: PromptTemplate) -> Self {
        Self {
            client,
            template,
            temperature: EVALUATION_TEMPERATURE,
        }
    }

    /// Wire provider, structured client and template from settings
    pub fn from_config(config: &Config, credentials: &Credentials) -> Result<Self, EvalError> {
        let provider = create_provider(config, credentials)?;
        let client = StructuredClient::from_config(Arc::new(provider), &config.provider);
        let template = PromptTemplate::load(config.prompt.template_path.as_deref())?;
        Ok(Self::new(client, template).with_temperature(config.provider.temperature))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Generate a rubric scoring `response` as an answer to `task_prompt`
    pub async fn generate(&self, task_prompt: &str, response: &str) -> Result<Rubric, StructuredError> {
        let messages = self.template.build_messages(task_prompt, response);

        tracing::info!(
            provider = self.client.provider_name(),
            template = self.template.version(),
            "requesting rubric"
        );

        let rubric: Rubric = self.client.create(messages, self.temperature).await?;

        tracing::info!(
            metrics = rubric.metrics.len(),
            criteria = rubric.criteria_count(),
            "rubric generated"
        );
        Ok(rubric)
    }
}
