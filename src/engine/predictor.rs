//! Prediction pipeline
//!
//! Payload in, `Prediction` out: make sure a model is loaded, normalize the
//! image and run the classifier on a blocking thread.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use super::ModelManager;
use crate::config::PreprocessConfig;
use crate::model::Prediction;
use crate::preprocess::{normalize_payload, DecodeError};
use crate::telemetry;

/// Request-level prediction failures
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("inference failed: {0}")]
    Inference(String),
}

impl PredictError {
    /// Label for `prediction_errors_total` and the `error_type` response field
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::ModelNotLoaded => "model_not_loaded",
            PredictError::Decode(e) => e.kind(),
            PredictError::Inference(_) => "inference_error",
        }
    }
}

/// Prediction together with the model version that produced it
#[derive(Debug, Clone)]
pub struct PredictOutcome {
    pub prediction: Prediction,
    pub model_version: String,
}

/// Runs predictions against the managed model
pub struct Predictor {
    manager: Arc<ModelManager>,
    preprocess: PreprocessConfig,
    confidence_threshold: f32,
}

impl Predictor {
    pub fn new(manager: Arc<ModelManager>, preprocess: PreprocessConfig, confidence_threshold: f32) -> Self {
        if preprocess.invert {
            tracing::info!("Input inversion enabled: pixel values are flipped before scaling");
        }
        Self {
            manager,
            preprocess,
            confidence_threshold,
        }
    }

    pub fn manager(&self) -> &Arc<ModelManager> {
        &self.manager
    }

    /// Classify a base64 image payload, recording metrics either way
    pub async fn predict(&self, payload: String) -> Result<PredictOutcome, PredictError> {
        let start = Instant::now();

        match self.run(payload).await {
            Ok(outcome) => {
                let p = &outcome.prediction;
                telemetry::record_prediction(
                    &outcome.model_version,
                    p.prediction,
                    p.confidence,
                    start.elapsed(),
                );
                if p.confidence < self.confidence_threshold {
                    tracing::debug!(
                        prediction = p.prediction,
                        confidence = p.confidence,
                        threshold = self.confidence_threshold,
                        "Low confidence prediction"
                    );
                }
                tracing::info!(
                    prediction = p.prediction,
                    confidence = p.confidence,
                    model_version = %outcome.model_version,
                    "Prediction"
                );
                Ok(outcome)
            }
            Err(e) => {
                telemetry::record_prediction_error(e.kind());
                tracing::warn!(error_type = e.kind(), error = %e, "Prediction failed");
                Err(e)
            }
        }
    }

    async fn run(&self, payload: String) -> Result<PredictOutcome, PredictError> {
        let model = self
            .manager
            .ensure_loaded()
            .await
            .ok_or(PredictError::ModelNotLoaded)?;

        let preprocess = self.preprocess.clone();
        let worker_model = Arc::clone(&model);
        let prediction = tokio::task::spawn_blocking(move || {
            let tensor = normalize_payload(&payload, &preprocess)?;
            worker_model
                .predict(&tensor)
                .map_err(|e| PredictError::Inference(format!("{:#}", e)))
        })
        .await
        .map_err(|e| PredictError::Inference(e.to_string()))??;

        Ok(PredictOutcome {
            prediction,
            model_version: model.version().to_string(),
        })
    }
}
