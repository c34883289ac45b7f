use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),
}

/// Main configuration for the crawl service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Social-media timeline API configuration
    #[serde(default)]
    pub twitter: TwitterConfig,
    /// Remote image classification configuration
    #[serde(default)]
    pub prediction: PredictionConfig,
    /// DynamoDB configuration
    #[serde(default)]
    pub dynamodb: DynamoDbConfig,
    /// Scratch storage for downloaded photos
    #[serde(default)]
    pub scratch: ScratchConfig,
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
    /// Prometheus exporter port; no exporter is installed when unset
    pub metrics_port: Option<u16>,
}

/// Timeline API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TwitterConfig {
    /// API base URL
    #[serde(default = "default_twitter_api_base")]
    pub api_base: String,
    /// Bearer token used for every timeline request
    #[serde(default)]
    pub access_token: String,
    /// Number of posts requested per call
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Whether reposts are included in the timeline
    #[serde(default)]
    pub include_retweets: bool,
    /// Request timeout in seconds (timeline and media downloads)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Prediction service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionConfig {
    /// Prediction API endpoint
    #[serde(default = "default_prediction_endpoint")]
    pub endpoint: String,
    /// Cloud project hosting the model
    #[serde(default)]
    pub project_id: String,
    /// Model region
    #[serde(default = "default_location")]
    pub location: String,
    /// Model identifier
    #[serde(default)]
    pub model_id: String,
    /// OAuth access token for the prediction API
    #[serde(default)]
    pub access_token: String,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// DynamoDB configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DynamoDbConfig {
    /// AWS region; falls back to the default provider chain when unset
    pub region: Option<String>,
    /// Custom endpoint URL (for DynamoDB Local, LocalStack, etc.)
    pub endpoint_url: Option<String>,
    /// Table holding the last seen post id per user
    #[serde(default = "default_cursor_table")]
    pub cursor_table: String,
    /// Table holding one record per classified photo
    #[serde(default = "default_media_table")]
    pub media_table: String,
}

/// Scratch storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScratchConfig {
    /// Directory downloaded photos are written to
    #[serde(default = "default_scratch_dir")]
    pub dir: PathBuf,
}

// Default value functions
fn default_service_name() -> String {
    "crawl-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_twitter_api_base() -> String {
    "https://api.twitter.com".to_string()
}

fn default_page_size() -> u32 {
    40
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_prediction_endpoint() -> String {
    "https://automl.googleapis.com".to_string()
}

fn default_location() -> String {
    "us-central1".to_string()
}

fn default_cursor_table() -> String {
    "NDSCursor".to_string()
}

fn default_media_table() -> String {
    "NDSMedia".to_string()
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir()
}

impl Config {
    /// Load configuration from config files and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .set_default("service.name", "crawl-service")?
            .set_default("service.log_level", "info")?
            .add_source(config::File::with_name("config/crawl").required(false))
            .add_source(config::File::with_name("/etc/nier/crawl").required(false))
            // CRAWL__TWITTER__ACCESS_TOKEN -> twitter.access_token
            .add_source(
                config::Environment::with_prefix("CRAWL")
                    .separator("__")
                    .try_parsing(true),
            )
            // Variable names the deployed function has always been given
            .set_override_option("twitter.access_token", env("TWITTER_ACCESS_TOKEN"))?
            .set_override_option("prediction.project_id", env("GCP_PROJECT_ID"))?
            .set_override_option("prediction.model_id", env("GCP_AUTOML_MODEL_ID"))?
            .set_override_option("prediction.access_token", env("GCP_ACCESS_TOKEN"))?
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Check required values are present and sane
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.twitter.access_token.is_empty() {
            return Err(ConfigError::MissingRequired("twitter.access_token".into()));
        }
        if self.prediction.project_id.is_empty() {
            return Err(ConfigError::MissingRequired("prediction.project_id".into()));
        }
        if self.prediction.model_id.is_empty() {
            return Err(ConfigError::MissingRequired("prediction.model_id".into()));
        }
        if self.prediction.access_token.is_empty() {
            return Err(ConfigError::MissingRequired(
                "prediction.access_token".into(),
            ));
        }
        if self.twitter.page_size == 0 || self.twitter.page_size > 200 {
            return Err(ConfigError::InvalidValue {
                key: "twitter.page_size".into(),
                message: format!("must be between 1 and 200, got {}", self.twitter.page_size),
            });
        }
        Ok(())
    }

    /// Get the timeline/download request timeout as Duration
    pub fn twitter_timeout(&self) -> Duration {
        Duration::from_secs(self.twitter.request_timeout_secs)
    }

    /// Get the prediction request timeout as Duration
    pub fn prediction_timeout(&self) -> Duration {
        Duration::from_secs(self.prediction.request_timeout_secs)
    }
}

impl PredictionConfig {
    /// Fully qualified model resource name
    pub fn model_name(&self) -> String {
        format!(
            "projects/{}/locations/{}/models/{}",
            self.project_id, self.location, self.model_id
        )
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: None,
        }
    }
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            api_base: default_twitter_api_base(),
            access_token: String::new(),
            page_size: default_page_size(),
            include_retweets: false,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_prediction_endpoint(),
            project_id: String::new(),
            location: default_location(),
            model_id: String::new(),
            access_token: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for DynamoDbConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint_url: None,
            cursor_table: default_cursor_table(),
            media_table: default_media_table(),
        }
    }
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            dir: default_scratch_dir(),
        }
    }
}
