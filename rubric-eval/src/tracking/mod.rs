//! Best-effort experiment tracking
//!
//! A [`RunLogger`] owns one tracking run and walks it through
//! uninitialized -> active -> finished. Every backend failure is logged and
//! swallowed so tracking can never abort an evaluation.

pub mod wandb;

pub use wandb::WandbClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::config::TrackingConfig;

/// Key/value payload logged against a run
pub type RunPayload = Map<String, Value>;

/// Identifies a run on the tracking service
#[derive(Debug, Clone, PartialEq)]
pub struct RunHandle {
    pub entity: String,
    pub project: String,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
}

impl RunHandle {
    /// Seconds elapsed since the run started
    pub fn runtime_secs(&self) -> f64 {
        (Utc::now() - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Tracking errors
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("GraphQL error: {0}")]
    GraphQL(String),
}

pub type TrackingResult<T> = Result<T, TrackingError>;

/// A tracking service capable of hosting runs
#[async_trait]
pub trait TrackingBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Authenticate and create a run in `project`
    async fn start_run(&self, project: &str) -> TrackingResult<RunHandle>;

    /// Append one payload to the run history
    async fn log(&self, run: &RunHandle, step: u64, payload: &RunPayload) -> TrackingResult<()>;

    /// Mark the run complete
    async fn finish(&self, run: &RunHandle, exit_code: i32) -> TrackingResult<()>;
}

/// Lifecycle of the tracked run
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Uninitialized,
    Active { run: RunHandle, step: u64 },
    Finished,
}

/// Session object wrapping one optional tracking run
pub struct RunLogger {
    backend: Option<Box<dyn TrackingBackend>>,
    state: RunState,
}

impl RunLogger {
    /// A logger that never touches the network
    pub fn disabled() -> Self {
        Self {
            backend: None,
            state: RunState::Uninitialized,
        }
    }

    /// Open a run; on failure the logger stays uninitialized
    pub async fn start(backend: Box<dyn TrackingBackend>, project: &str) -> Self {
        match backend.start_run(project).await {
            Ok(run) => {
                tracing::info!(
                    "Tracking run {}/{}/{} on {}",
                    run.entity,
                    run.project,
                    run.run_id,
                    backend.name()
                );
                Self {
                    backend: Some(backend),
                    state: RunState::Active { run, step: 0 },
                }
            }
            Err(e) => {
                tracing::warn!("Tracking disabled, could not start {} run: {}", backend.name(), e);
                Self::disabled()
            }
        }
    }

    /// Build from settings; returns a disabled logger without a key
    pub async fn from_config(config: &TrackingConfig, api_key: Option<String>) -> Self {
        if !config.enabled {
            tracing::debug!("Tracking disabled by configuration");
            return Self::disabled();
        }
        let Some(api_key) = api_key else {
            return Self::disabled();
        };
        match WandbClient::from_config(config, api_key) {
            Ok(client) => Self::start(Box::new(client), &config.project).await,
            Err(e) => {
                tracing::warn!("Tracking disabled: {}", e);
                Self::disabled()
            }
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, RunState::Active { .. })
    }

    /// Log a payload against the active run; no-op otherwise
    pub async fn log(&mut self, payload: &RunPayload) {
        let Some(backend) = &self.backend else {
            return;
        };
        let RunState::Active { run, step } = &mut self.state else {
            return;
        };
        match backend.log(run, *step, payload).await {
            Ok(()) => *step += 1,
            Err(e) => tracing::warn!("Failed to log to {}: {}", backend.name(), e),
        }
    }

    /// Finalize the active run; no-op otherwise
    pub async fn finish(&mut self, exit_code: i32) {
        if !self.is_active() {
            return;
        }
        let RunState::Active { run, .. } = std::mem::replace(&mut self.state, RunState::Finished) else {
            return;
        };
        if let Some(backend) = &self.backend {
            if let Err(e) = backend.finish(&run, exit_code).await {
                tracing::warn!("Failed to finish {} run {}: {}", backend.name(), run.run_id, e);
            }
        }
    }
}
