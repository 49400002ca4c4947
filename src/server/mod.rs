//! HTTP server
//!
//! Health, prediction, info and Prometheus endpoints over the shared
//! `Predictor`.

mod handlers;
mod middleware;
mod routes;

use std::sync::Arc;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

pub use handlers::{
    AppState, ErrorResponse, HealthResponse, InfoResponse, PredictRequest, PredictResponse,
    SERVICE_NAME,
};
pub use middleware::REQUEST_ID_HEADER;
pub use routes::api_routes;

/// Build the full application router
pub fn router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let mut app = Router::new()
        .merge(api_routes())
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(TraceLayer::new_for_http());

    if config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app.with_state(state)
}

/// Bind the listener and serve until shutdown.
///
/// `on_bound` runs once the socket is accepting connections, which is where
/// background model resolution is kicked off.
pub async fn start<F>(state: Arc<AppState>, config: ServerConfig, on_bound: F) -> Result<()>
where
    F: FnOnce(),
{
    let app = router(state, &config);

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  GET  /health - Health check");
    tracing::info!("  POST /predict - Classify a base64 digit image");
    tracing::info!("  GET  /api/info - Service information");
    tracing::info!("  GET  /metrics - Prometheus metrics");

    on_bound();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
