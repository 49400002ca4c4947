//! Tracking server and model resolution settings

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where to find a servable model and how hard to look for it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// MLflow tracking server URI
    #[serde(default = "default_uri")]
    pub uri: String,

    /// Registered model name
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Registry stage to serve
    #[serde(default = "default_stage")]
    pub stage: String,

    /// Experiment searched when falling back to the best run
    #[serde(default = "default_experiment_name")]
    pub experiment_name: String,

    /// Metric used to rank runs (higher is better)
    #[serde(default = "default_ranking_metric")]
    pub ranking_metric: String,

    /// Baked-in model path, tried before the registry
    #[serde(default)]
    pub local_path: Option<PathBuf>,

    /// Continue to the next source when one fails
    #[serde(default = "default_true")]
    pub allow_fallback: bool,

    /// Directory where downloaded artifacts are stored
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// TCP connect timeout for tracking server calls
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Overall timeout for a single tracking server call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Minimum wait after a failed resolution before a request may retry
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,
}

fn default_uri() -> String {
    "http://localhost:5000".to_string()
}

fn default_model_name() -> String {
    "Mnist_Best_Model".to_string()
}

fn default_stage() -> String {
    "Production".to_string()
}

fn default_experiment_name() -> String {
    "MNIST_Classification_Experiments".to_string()
}

fn default_ranking_metric() -> String {
    "test_accuracy".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("digitserve").join("artifacts")
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

fn default_retry_interval() -> u64 {
    30
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            model_name: default_model_name(),
            stage: default_stage(),
            experiment_name: default_experiment_name(),
            ranking_metric: default_ranking_metric(),
            local_path: None,
            allow_fallback: true,
            cache_dir: default_cache_dir(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            retry_interval_secs: default_retry_interval(),
        }
    }
}

impl TrackingConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    /// Registry URI of the configured model stage, e.g. `models:/Digits/Production`
    pub fn model_uri(&self) -> String {
        format!("models:/{}/{}", self.model_name, self.stage)
    }
}
