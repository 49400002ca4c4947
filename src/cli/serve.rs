//! HTTP server command

use std::sync::Arc;

use anyhow::Result;

use crate::config::AppConfig;
use crate::engine::{ModelManager, Predictor};
use crate::loader::OnnxLoader;
use crate::resolver::ModelResolver;
use crate::server::{self, AppState};
use crate::telemetry;

/// Start the prediction server
pub async fn serve(config: AppConfig) -> Result<()> {
    let metrics = telemetry::install_metrics()?;

    let resolver = ModelResolver::from_config(&config.tracking, Arc::new(OnnxLoader))?;
    let manager = Arc::new(
        ModelManager::new(resolver).with_retry_interval(config.tracking.retry_interval()),
    );
    let predictor = Predictor::new(
        Arc::clone(&manager),
        config.preprocess.clone(),
        config.confidence_threshold,
    );
    let state = Arc::new(AppState::new(predictor, metrics, &config));

    tracing::info!(
        environment = %config.environment,
        model = %config.tracking.model_name,
        stage = %config.tracking.stage,
        tracking_uri = %config.tracking.uri,
        workers = config.server.workers,
        "Starting MNIST Classification API"
    );

    // Resolution starts only once the listener is bound so /health answers
    // while the model is still being fetched
    server::start(state, config.server.clone(), move || {
        manager.spawn_initial_load();
    })
    .await
}
