//! Classifier configuration for the triage engine.
//!
//! Configuration is read once at startup (by the host service or by
//! [`ClassifierConfig::from_env`]) and injected into the engine, which never
//! reads the environment itself.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Configuration for the image classifier strategies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Credential for the live vision service. Live classification is
    /// disabled when absent.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Vision model identifier
    #[serde(default = "default_model")]
    pub model: String,
    /// Chat completions endpoint of the live service
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Skip the live service and always use the simulated classifier
    #[serde(default)]
    pub force_simulation: bool,
    /// Upper bound for a single live classification request in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Completion token budget for the live response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature; kept low for consistent JSON output
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Fixed seed for the simulated classifier (reproducible draws)
    #[serde(default)]
    pub simulation_seed: Option<u64>,
}

fn default_model() -> String {
    "meta-llama/llama-4-scout-17b-16e-instruct".to_string()
}

fn default_endpoint() -> String {
    "https://api.groq.com/openai/v1/chat/completions".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_tokens() -> u32 {
    300
}

fn default_temperature() -> f32 {
    0.1
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            endpoint: default_endpoint(),
            force_simulation: false,
            request_timeout_secs: default_request_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            simulation_seed: None,
        }
    }
}

impl ClassifierConfig {
    /// Configuration that never calls the live service
    pub fn simulated() -> Self {
        Self {
            force_simulation: true,
            ..Default::default()
        }
    }

    /// Load configuration from environment variables
    ///
    /// Reads `GROQ_API_KEY`, `GROQ_MODEL`, `CLASSIFIER_ENDPOINT` and
    /// `USE_SIMULATED_AI` / `FORCE_SIMULATION`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Overlay the well-known environment variables onto this configuration
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(key) = std::env::var("GROQ_API_KEY") {
            if !key.trim().is_empty() {
                self.api_key = Some(key);
            }
        }

        if let Ok(model) = std::env::var("GROQ_MODEL") {
            if !model.trim().is_empty() {
                self.model = model;
            }
        }

        if let Ok(endpoint) = std::env::var("CLASSIFIER_ENDPOINT") {
            self.endpoint = endpoint;
        }

        for var in ["USE_SIMULATED_AI", "FORCE_SIMULATION"] {
            if let Ok(value) = std::env::var(var) {
                self.force_simulation = parse_flag(var, &value)?;
            }
        }

        Ok(())
    }

    /// Whether a live classifier can be constructed from this configuration
    pub fn live_enabled(&self) -> bool {
        !self.force_simulation
            && self
                .api_key
                .as_deref()
                .is_some_and(|key| !key.trim().is_empty())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::MissingRequired("classifier.model".to_string()));
        }

        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "classifier.endpoint".to_string(),
                message: "endpoint must start with http:// or https://".to_string(),
            });
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "classifier.request_timeout_secs".to_string(),
                message: "timeout must be greater than 0".to_string(),
            });
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidValue {
                key: "classifier.temperature".to_string(),
                message: "temperature must be between 0.0 and 2.0".to_string(),
            });
        }

        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{}'", other),
        }),
    }
}
