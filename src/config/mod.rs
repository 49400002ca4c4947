//! Configuration system for digitserve
//!
//! `AppConfig` can be read from a YAML or JSON file and is then overridden by
//! environment variables, which is how container deployments configure it.

mod preprocess;
mod server;
mod tracking;

pub use preprocess::PreprocessConfig;
pub use server::ServerConfig;
pub use tracking::TrackingConfig;

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder secret shipped in development defaults
pub const DEV_SECRET_KEY: &str = "dev-secret-key-change-in-production";

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("invalid value for {key}: '{value}'")]
    InvalidEnv { key: String, value: String },

    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

/// Top-level digitserve configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment ("development", "staging", "production")
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Secret key; must be changed from the default in production
    #[serde(default = "default_secret_key")]
    pub secret_key: String,

    /// Optional API key, reserved for request authentication
    #[serde(default)]
    pub api_key: Option<String>,

    /// Minimum confidence considered reliable. Validated, not yet enforced.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Tracking server and model resolution settings
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Image normalization settings
    #[serde(default)]
    pub preprocess: PreprocessConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_secret_key() -> String {
    DEV_SECRET_KEY.to_string()
}

fn default_confidence_threshold() -> f32 {
    0.7
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            secret_key: default_secret_key(),
            api_key: None,
            confidence_threshold: default_confidence_threshold(),
            server: ServerConfig::default(),
            tracking: TrackingConfig::default(),
            preprocess: PreprocessConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let (display, content) = read_file(path.as_ref())?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: display,
            reason: e.to_string(),
        })
    }

    /// Load configuration from a JSON file
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let (display, content) = read_file(path.as_ref())?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: display,
            reason: e.to_string(),
        })
    }

    /// Load from an optional file (format picked by extension), then apply
    /// environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => match p.extension().and_then(|e| e.to_str()) {
                Some("json") => Self::from_json(p)?,
                _ => Self::from_yaml(p)?,
            },
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Override fields from an arbitrary variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup: &lookup };

        if let Some(v) = env.string("ENVIRONMENT") {
            self.environment = v;
        }
        if let Some(v) = env.string("SECRET_KEY") {
            self.secret_key = v;
        }
        if let Some(v) = env.string("API_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = env.parse("CONFIDENCE_THRESHOLD")? {
            self.confidence_threshold = v;
        }

        if let Some(v) = env.string("LOG_LEVEL") {
            self.logging.level = v.to_ascii_lowercase();
        }
        if let Some(v) = env.parse("LOG_FORMAT")? {
            self.logging.format = v;
        }

        if let Some(v) = env.string("API_HOST") {
            self.server.host = v;
        }
        if let Some(v) = env.parse("API_PORT")? {
            self.server.port = v;
        }
        if let Some(v) = env.parse("API_WORKERS")? {
            self.server.workers = v;
        }
        if let Some(v) = env.parse("MAX_BODY_SIZE")? {
            self.server.max_body_size = v;
        }

        if let Some(v) = env.string("MLFLOW_TRACKING_URI") {
            self.tracking.uri = v;
        }
        if let Some(v) = env.string("MODEL_NAME") {
            self.tracking.model_name = v;
        }
        if let Some(v) = env.string("EXPERIMENT_NAME") {
            self.tracking.experiment_name = v;
        }
        if let Some(v) = env.string("MODEL_STAGE") {
            self.tracking.stage = v;
        }
        if let Some(v) = env.string("RANKING_METRIC") {
            self.tracking.ranking_metric = v;
        }
        if let Some(v) = env.string("MODEL_LOCAL_PATH") {
            self.tracking.local_path = Some(v.into());
        }
        if let Some(v) = env.string("MODEL_CACHE_DIR") {
            self.tracking.cache_dir = v.into();
        }
        if let Some(v) = env.flag("ALLOW_RUN_FALLBACK")? {
            self.tracking.allow_fallback = v;
        }
        if let Some(v) = env.parse("TRACKING_CONNECT_TIMEOUT_SECS")? {
            self.tracking.connect_timeout_secs = v;
        }
        if let Some(v) = env.parse("TRACKING_TIMEOUT_SECS")? {
            self.tracking.request_timeout_secs = v;
        }
        if let Some(v) = env.parse("MODEL_RETRY_INTERVAL_SECS")? {
            self.tracking.retry_interval_secs = v;
        }

        if let Some(v) = env.flag("INVERT_INPUT")? {
            self.preprocess.invert = v;
        }

        Ok(())
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_production() && self.secret_key == DEV_SECRET_KEY {
            return Err(ConfigError::invalid(
                "secret_key",
                "SECRET_KEY must be set in production environment",
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port", "port must be 1-65535"));
        }

        if self.server.workers == 0 {
            return Err(ConfigError::invalid(
                "server.workers",
                "at least one worker is required",
            ));
        }

        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::invalid(
                "confidence_threshold",
                format!("{} is outside [0, 1]", self.confidence_threshold),
            ));
        }

        if self.tracking.model_name.trim().is_empty() {
            return Err(ConfigError::invalid("tracking.model_name", "must not be empty"));
        }

        Ok(())
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

fn read_file(path: &Path) -> Result<(String, String), ConfigError> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: display.clone(),
        source,
    })?;
    Ok((display, content))
}

struct EnvReader<'a, F> {
    lookup: &'a F,
}

impl<F> EnvReader<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.string(key) {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidEnv {
                    key: key.to_string(),
                    value,
                }),
            None => Ok(None),
        }
    }

    fn flag(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.string(key) {
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Some(true)),
                "0" | "false" | "no" | "off" => Ok(Some(false)),
                _ => Err(ConfigError::InvalidEnv {
                    key: key.to_string(),
                    value,
                }),
            },
            None => Ok(None),
        }
    }
}
