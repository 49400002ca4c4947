//! Logging and metrics
//!
//! Metric names and labels follow the dashboards built for the service:
//! prediction counters by model version and class, a latency histogram,
//! error counters by kind and per-endpoint request counters.

use std::time::Duration;

use anyhow::{anyhow, Result};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

pub const PREDICTIONS_TOTAL: &str = "predictions_total";
pub const PREDICTION_LATENCY: &str = "prediction_latency_seconds";
pub const PREDICTION_CONFIDENCE: &str = "prediction_confidence";
pub const PREDICTION_ERRORS: &str = "prediction_errors_total";
pub const API_REQUESTS: &str = "api_requests_total";
pub const ACTIVE_REQUESTS: &str = "active_requests";

/// Histogram buckets for prediction latency, in seconds
pub const LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0];

static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. JSON output is
/// used when requested or when running in production.
pub fn init_logging(config: &LoggingConfig, production: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| anyhow!("invalid log level '{}': {}", config.level, e))?,
    };

    let registry = tracing_subscriber::registry().with(filter);

    if config.format == LogFormat::Json || production {
        registry
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow!("failed to init logging: {}", e))?;
    } else {
        registry
            .with(fmt::layer())
            .try_init()
            .map_err(|e| anyhow!("failed to init logging: {}", e))?;
    }

    Ok(())
}

/// Install the Prometheus recorder. Safe to call repeatedly; the first call
/// installs it and later calls return the same handle.
pub fn install_metrics() -> Result<PrometheusHandle> {
    PROMETHEUS
        .get_or_try_init(|| -> Result<PrometheusHandle> {
            let handle = PrometheusBuilder::new()
                .set_buckets_for_metric(Matcher::Full(PREDICTION_LATENCY.to_string()), LATENCY_BUCKETS)?
                .install_recorder()?;
            describe_metrics();
            Ok(handle)
        })
        .cloned()
}

fn describe_metrics() {
    describe_counter!(PREDICTIONS_TOTAL, "Total number of predictions made");
    describe_histogram!(PREDICTION_LATENCY, "Time spent processing prediction");
    describe_gauge!(PREDICTION_CONFIDENCE, "Confidence score of the latest prediction");
    describe_counter!(PREDICTION_ERRORS, "Total number of prediction errors");
    describe_counter!(API_REQUESTS, "Total API requests");
    describe_gauge!(ACTIVE_REQUESTS, "Number of requests being processed");
}

/// Record a successful prediction
pub fn record_prediction(model_version: &str, predicted_class: u8, confidence: f32, latency: Duration) {
    counter!(
        PREDICTIONS_TOTAL,
        "model_version" => model_version.to_string(),
        "predicted_class" => predicted_class.to_string()
    )
    .increment(1);
    histogram!(PREDICTION_LATENCY).record(latency.as_secs_f64());
    gauge!(PREDICTION_CONFIDENCE).set(f64::from(confidence));
}

/// Record a failed prediction
pub fn record_prediction_error(error_type: &str) {
    counter!(PREDICTION_ERRORS, "error_type" => error_type.to_string()).increment(1);
}

/// Record a completed HTTP request
pub fn record_request(method: &str, endpoint: &str, status_code: u16) {
    counter!(
        API_REQUESTS,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Tracks one in-flight request in the `active_requests` gauge
pub struct ActiveRequest(());

impl ActiveRequest {
    pub fn start() -> Self {
        gauge!(ACTIVE_REQUESTS).increment(1.0);
        Self(())
    }
}

impl Drop for ActiveRequest {
    fn drop(&mut self) {
        gauge!(ACTIVE_REQUESTS).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_is_idempotent() {
        let first = install_metrics().unwrap();
        let second = install_metrics().unwrap();

        record_prediction("3", 7, 0.93, Duration::from_millis(20));
        record_prediction_error("invalid_base64");
        record_request("POST", "/predict", 200);
        drop(ActiveRequest::start());

        let rendered = second.render();
        assert!(rendered.contains("predictions_total"));
        assert!(rendered.contains("predicted_class=\"7\""));
        assert!(rendered.contains("prediction_latency_seconds_bucket"));
        assert!(rendered.contains("le=\"0.05\""));
        assert!(rendered.contains("error_type=\"invalid_base64\""));
        assert!(rendered.contains("active_requests"));
        assert!(first.render().contains("api_requests_total"));
    }
}
