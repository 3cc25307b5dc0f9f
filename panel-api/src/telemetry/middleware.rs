//! Axum Middleware for HTTP Request Metrics
//!
//! Records a Prometheus sample and a structured log line per request.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info_span, Instrument};

use super::metrics::with_metrics;

/// Route label for a request: the matched route template when available,
/// so `/api/table-data/:name` is one series instead of one per name.
fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

/// Observability middleware for Axum.
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = route_label(&request);

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.route = %route,
    );

    let response = next.run(request).instrument(span).await;

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();
    with_metrics(|m| m.record_http_request(method.as_str(), &route, status, duration));

    tracing::debug!(
        method = %method,
        route = %route,
        status = status,
        duration_ms = duration * 1000.0,
        "Request completed"
    );

    response
}
