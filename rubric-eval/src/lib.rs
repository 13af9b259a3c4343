//! Rubric generation for LLM responses
//!
//! Given a task prompt and a candidate response, this crate asks an
//! evaluator model to design a custom rubric (3 to 10 metrics), score the
//! response against it, and return the result as validated structured data.
//!
//! # Features
//!
//! - OpenRouter / OpenAI-compatible chat-completion client
//! - Structured output with schema validation and bounded re-asking
//! - Versioned, overridable instruction template
//! - Best-effort run tracking on Weights & Biases
//!
//! # Example
//!
//! ```no_run
//! use rubric_eval::{
//!     config::{Config, Credentials},
//!     evaluator::{RubricGenerator, SAMPLE_PROMPT, SAMPLE_RESPONSE},
//!     reporting::{print_report, ReportFormat},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_or_default();
//!     let credentials = Credentials::from_env(&config);
//!
//!     let generator = RubricGenerator::from_config(&config, &credentials)?;
//!     let rubric = generator.generate(SAMPLE_PROMPT, SAMPLE_RESPONSE).await?;
//!
//!     print_report(&rubric, ReportFormat::Text)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod evaluator;
pub mod prompt;
pub mod providers;
pub mod reporting;
pub mod rubric;
pub mod structured;
pub mod tracking;

pub use config::{Config, Credentials};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::config::{Config, Credentials, ResponseMode};
    pub use crate::evaluator::{EvalError, RubricGenerator};
    pub use crate::prompt::PromptTemplate;
    pub use crate::providers::{
        create_provider, CompletionRequest, CompletionResponse, LLMProvider, Message,
        OpenRouterClient, ProviderError, ProviderResult,
    };
    pub use crate::reporting::{print_report, ReportFormat};
    pub use crate::rubric::{Criterion, Metric, Rubric, SchemaError};
    pub use crate::structured::{StructuredClient, StructuredError, StructuredResponse};
    pub use crate::tracking::{RunLogger, RunPayload, TrackingBackend, WandbClient};
}
