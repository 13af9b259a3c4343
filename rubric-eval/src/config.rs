//! Configuration management for rubric-eval
//!
//! Loads provider, tracking and prompt settings from TOML files and reads
//! API credentials from the process environment.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default OpenAI-compatible endpoint
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
/// Default evaluator model
pub const DEFAULT_MODEL: &str = "openai/gpt-4o";
/// Default tracking project name
pub const DEFAULT_PROJECT: &str = "openrouter-chat";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
}

/// Chat-completion provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_name")]
    pub name: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the provider key
    #[serde(default = "default_provider_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
    /// Total structured-output attempts, including the first request
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub response_mode: ResponseMode,
}

/// How the provider is asked to produce JSON
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// `response_format: {"type": "json_object"}` plus the schema in the system message
    #[default]
    JsonObject,
    /// `response_format: {"type": "json_schema", ...}` with the rubric schema attached
    JsonSchema,
}

/// Experiment tracking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_project")]
    pub project: String,
    #[serde(default = "default_tracking_base_url")]
    pub base_url: String,
    /// Environment variable holding the tracking key
    #[serde(default = "default_tracking_key_env")]
    pub api_key_env: String,
    /// Overrides the entity resolved at login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default = "default_tracking_timeout_ms")]
    pub timeout_ms: u64,
}

/// Instruction template settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Replaces the built-in instruction template when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_path: Option<PathBuf>,
}

// Default value functions
fn default_true() -> bool { true }
fn default_provider_name() -> String { "openrouter".to_string() }
fn default_base_url() -> String { DEFAULT_BASE_URL.to_string() }
fn default_model() -> String { DEFAULT_MODEL.to_string() }
fn default_provider_key_env() -> String { "OPENROUTER_API_KEY".to_string() }
fn default_temperature() -> f32 { 0.7 }
fn default_provider_timeout_ms() -> u64 { 120_000 }
fn default_max_attempts() -> u32 { 3 }
fn default_project() -> String { DEFAULT_PROJECT.to_string() }
fn default_tracking_base_url() -> String { "https://api.wandb.ai".to_string() }
fn default_tracking_key_env() -> String { "WANDB_API_KEY".to_string() }
fn default_tracking_timeout_ms() -> u64 { 10_000 }

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_provider_key_env(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_ms: default_provider_timeout_ms(),
            max_attempts: default_max_attempts(),
            response_mode: ResponseMode::default(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            project: default_project(),
            base_url: default_tracking_base_url(),
            api_key_env: default_tracking_key_env(),
            entity: None,
            timeout_ms: default_tracking_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from an explicit path, or search the default locations
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let config = Self::from_file(path)?;
                tracing::info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            None => Ok(Self::load_or_default()),
        }
    }

    /// Load from default config location or return defaults
    pub fn load_or_default() -> Self {
        let config_paths = [
            "rubric-eval.toml",
            "config/rubric-eval.toml",
            "../config/rubric-eval.toml",
        ];

        for path in &config_paths {
            if !Path::new(path).exists() {
                continue;
            }
            match Self::from_file(path) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", path);
                    return config;
                }
                Err(e) => tracing::warn!("Ignoring {}: {}", path, e),
            }
        }

        tracing::debug!("Using default configuration");
        Self::default()
    }

    /// Save configuration to a TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// API keys read from the environment
///
/// Keys are never validated here. A missing provider key only shows up as an
/// authentication failure once the request is sent.
#[derive(Clone, Default)]
pub struct Credentials {
    pub provider_api_key: Option<String>,
    pub tracking_api_key: Option<String>,
}

impl Credentials {
    /// Read both keys using the variable names from `config`
    pub fn from_env(config: &Config) -> Self {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    /// Read both keys through an arbitrary lookup; empty values count as absent
    pub fn from_lookup<F>(config: &Config, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            provider_api_key: read(&config.provider.api_key_env),
            tracking_api_key: read(&config.tracking.api_key_env),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |k: &Option<String>| if k.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("provider_api_key", &mask(&self.provider_api_key))
            .field("tracking_api_key", &mask(&self.tracking_api_key))
            .finish()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.provider.model, "openai/gpt-4o");
        assert_eq!(config.provider.temperature, 0.7);
        assert_eq!(config.provider.max_attempts, 3);
        assert_eq!(config.provider.response_mode, ResponseMode::JsonObject);
        assert_eq!(config.tracking.project, "openrouter-chat");
        assert!(config.tracking.enabled);
        assert!(config.prompt.template_path.is_none());
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml = r#"
[provider]
model = "anthropic/claude-3.5-sonnet"
response_mode = "json_schema"
max_tokens = 2048

[tracking]
enabled = false
entity = "eval-team"
"#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.provider.model, "anthropic/claude-3.5-sonnet");
        assert_eq!(config.provider.response_mode, ResponseMode::JsonSchema);
        assert_eq!(config.provider.max_tokens, Some(2048));
        // Unspecified fields keep their defaults
        assert_eq!(config.provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.provider.temperature, 0.7);
        assert!(!config.tracking.enabled);
        assert_eq!(config.tracking.entity.as_deref(), Some("eval-team"));
        assert_eq!(config.tracking.api_key_env, "WANDB_API_KEY");
    }

    #[test]
    fn test_parse_error() {
        let err = Config::from_toml("[provider]\ntemperature = \"hot\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rubric-eval.toml");

        let mut config = Config::default();
        config.provider.model = "openai/gpt-4o-mini".to_string();
        config.save_toml(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.provider.model, "openai/gpt-4o-mini");
        assert_eq!(loaded.tracking.project, DEFAULT_PROJECT);
    }

    #[test]
    fn test_load_missing_explicit_path() {
        let err = Config::load(Some(Path::new("/nonexistent/rubric-eval.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_credentials_lookup() {
        let config = Config::default();
        let env: HashMap<&str, &str> = [("OPENROUTER_API_KEY", "sk-or-1"), ("WANDB_API_KEY", "  ")]
            .into_iter()
            .collect();

        let creds = Credentials::from_lookup(&config, |name| env.get(name).map(|v| v.to_string()));
        assert_eq!(creds.provider_api_key.as_deref(), Some("sk-or-1"));
        // Blank tracking key is treated as missing
        assert!(creds.tracking_api_key.is_none());
    }

    #[test]
    fn test_credentials_custom_env_names() {
        let mut config = Config::default();
        config.provider.api_key_env = "MY_LLM_KEY".to_string();
        config.tracking.api_key_env = "MY_TRACKING_KEY".to_string();

        let creds = Credentials::from_lookup(&config, |name| match name {
            "MY_LLM_KEY" => Some("llm".to_string()),
            "MY_TRACKING_KEY" => Some("track".to_string()),
            _ => None,
        });
        assert_eq!(creds.provider_api_key.as_deref(), Some("llm"));
        assert_eq!(creds.tracking_api_key.as_deref(), Some("track"));
    }

    #[test]
    fn test_credentials_debug_masks_keys() {
        let creds = Credentials {
            provider_api_key: Some("secret-value".to_string()),
            tracking_api_key: None,
        };
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("secret-value"));
        assert!(debug.contains("<set>"));
        assert!(debug.contains("<unset>"));
    }
}
