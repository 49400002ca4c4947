//! Route definitions

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use super::handlers::{api_info, health, metrics, predict, AppState};
use super::middleware::track_requests;

/// Create the API router
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/api/info", get(api_info))
        .route("/metrics", get(metrics))
        .route_layer(middleware::from_fn(track_requests))
}
