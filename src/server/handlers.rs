//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::engine::{PredictError, Predictor};
use crate::model::Prediction;

/// Service name reported by `/api/info`
pub const SERVICE_NAME: &str = "MNIST Classification API";

/// Shared application state
pub struct AppState {
    pub predictor: Predictor,
    pub metrics: PrometheusHandle,
    pub environment: String,
    pub model_name: String,
    pub model_stage: String,
    pub tracking_uri: String,
}

impl AppState {
    pub fn new(predictor: Predictor, metrics: PrometheusHandle, config: &AppConfig) -> Self {
        Self {
            predictor,
            metrics,
            environment: config.environment.clone(),
            model_name: config.tracking.model_name.clone(),
            model_stage: config.tracking.stage.clone(),
            tracking_uri: config.tracking.uri.clone(),
        }
    }
}

/// Health check endpoint. Always 200; the body says whether a model is loaded.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let current = state.predictor.manager().current();

    Json(HealthResponse {
        status: if current.is_some() { "healthy" } else { "unhealthy" }.to_string(),
        model_loaded: current.is_some(),
        model_name: state.model_name.clone(),
        model_version: current
            .map(|m| m.version().to_string())
            .unwrap_or_else(|| "unknown".to_string()),
    })
}

/// Digit prediction endpoint
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => {
            return error_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                rejection.body_text(),
                "validation_error",
            );
        }
    };

    match state.predictor.predict(request.image).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome.prediction)).into_response(),
        Err(e) => error_response(status_for(&e), e.to_string(), e.kind()),
    }
}

/// Service and configuration summary
pub async fn api_info(State(state): State<Arc<AppState>>) -> Json<InfoResponse> {
    Json(InfoResponse {
        name: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.environment.clone(),
        model_name: state.model_name.clone(),
        model_stage: state.model_stage.clone(),
        mlflow_uri: state.tracking_uri.clone(),
    })
}

/// Prometheus exposition
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn status_for(error: &PredictError) -> StatusCode {
    match error {
        PredictError::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
        PredictError::Decode(_) => StatusCode::BAD_REQUEST,
        PredictError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, detail: String, error_type: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            detail,
            error_type: error_type.to_string(),
        }),
    )
        .into_response()
}

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    /// Base64 image, optionally behind a `data:image/...;base64,` prefix
    pub image: String,
}

/// Successful prediction body
pub type PredictResponse = Prediction;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub model_name: String,
    pub model_version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InfoResponse {
    pub name: String,
    pub version: String,
    pub environment: String,
    pub model_name: String,
    pub model_stage: String,
    pub mlflow_uri: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub error_type: String,
}
