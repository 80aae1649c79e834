use pawtrack_triage::ClassifierConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the reports service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Report store configuration
    #[serde(default)]
    pub store: StoreConfig,
    /// Image classifier configuration
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    /// Serve Prometheus metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

/// Flat-file report store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// JSON file holding all reports
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

/// API configuration for the reports endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API listen address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// API listen port
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
    /// Allowed CORS origins
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Upper bound for one triage call in seconds
    #[serde(default = "default_triage_timeout_secs")]
    pub triage_timeout_secs: u64,
    /// Maximum request body size in bytes (photos arrive base64-encoded)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

// Default value functions
fn default_service_name() -> String {
    "pawtrack-reports".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_true() -> bool {
    true
}

fn default_store_path() -> PathBuf {
    PathBuf::from("database/reports.json")
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_triage_timeout_secs() -> u64 {
    45
}

fn default_max_body_bytes() -> usize {
    20 * 1024 * 1024 // 20MB
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Add config file if present
            .add_source(config::File::with_name("config/reports").required(false))
            .add_source(config::File::with_name("/etc/pawtrack/reports").required(false))
            // Override with environment variables
            // PAWTRACK__CLASSIFIER__API_KEY -> classifier.api_key
            .add_source(
                config::Environment::with_prefix("PAWTRACK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = config.try_deserialize()?;

        // GROQ_API_KEY / GROQ_MODEL / USE_SIMULATED_AI from existing deployments
        config.classifier.apply_env_overrides()?;
        config.classifier.validate()?;

        Ok(config)
    }

    /// Get triage timeout as Duration
    pub fn triage_timeout(&self) -> Duration {
        Duration::from_secs(self.api.triage_timeout_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
            metrics_enabled: true,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            cors_enabled: true,
            cors_origins: Vec::new(),
            triage_timeout_secs: default_triage_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}
