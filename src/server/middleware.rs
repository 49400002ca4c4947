//! Request accounting middleware

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};

use crate::telemetry::{self, ActiveRequest};

/// Header carrying the per-request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Count requests per endpoint, track in-flight requests and log each one
pub async fn track_requests(request: Request, next: Next) -> Response {
    let _active = ActiveRequest::start();
    let start = Instant::now();

    let method = request.method().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let request_id = uuid::Uuid::new_v4().to_string();

    let mut response = next.run(request).await;

    let status = response.status().as_u16();
    telemetry::record_request(&method, &endpoint, status);
    tracing::info!(
        request_id = %request_id,
        method = %method,
        endpoint = %endpoint,
        status,
        latency_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Request completed"
    );

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
