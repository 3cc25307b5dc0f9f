//! Prometheus Metrics
//!
//! HTTP traffic, cache tier outcomes, SSE subscribers and handler runs,
//! scraped from `GET /metrics`.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// Latency buckets in seconds, 1ms through 10s.
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Process-wide metrics, registered on first use.
pub static METRICS: Lazy<ApiResult<PanelMetrics>> = Lazy::new(PanelMetrics::new);

/// Container for all Panel metrics.
#[derive(Clone)]
pub struct PanelMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Cache lookups - labels: tier (data/response/startup), outcome (hit/miss)
    pub cache_lookups_total: CounterVec,

    /// Entries removed by courtesy eviction - labels: tier
    pub cache_evictions_total: CounterVec,

    /// Current live SSE subscribers
    pub sse_subscribers: Gauge,

    /// Published events - labels: kind (update/auto_update)
    pub broadcasts_total: CounterVec,

    /// Handler executions - labels: endpoint, status (success/error)
    pub handler_runs_total: CounterVec,
}

fn registration_failed(name: &'static str) -> impl FnOnce(prometheus::Error) -> ApiError {
    move |e| ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

impl PanelMetrics {
    /// Register every metric with the default Prometheus registry.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "panel_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(registration_failed("http_requests_total"))?,

            http_request_duration_seconds: register_histogram_vec!(
                "panel_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(registration_failed("http_request_duration_seconds"))?,

            cache_lookups_total: register_counter_vec!(
                "panel_cache_lookups_total",
                "Total cache lookups by tier and outcome",
                &["tier", "outcome"]
            )
            .map_err(registration_failed("cache_lookups_total"))?,

            cache_evictions_total: register_counter_vec!(
                "panel_cache_evictions_total",
                "Total entries removed by eviction",
                &["tier"]
            )
            .map_err(registration_failed("cache_evictions_total"))?,

            sse_subscribers: register_gauge!(
                "panel_sse_subscribers",
                "Current number of live SSE subscribers"
            )
            .map_err(registration_failed("sse_subscribers"))?,

            broadcasts_total: register_counter_vec!(
                "panel_broadcasts_total",
                "Total events published to subscribers",
                &["kind"]
            )
            .map_err(registration_failed("broadcasts_total"))?,

            handler_runs_total: register_counter_vec!(
                "panel_handler_runs_total",
                "Total dashboard handler executions",
                &["endpoint", "status"]
            )
            .map_err(registration_failed("handler_runs_total"))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a cache lookup.
    pub fn record_cache_lookup(&self, tier: &str, hit: bool) {
        let outcome = if hit { "hit" } else { "miss" };
        self.cache_lookups_total
            .with_label_values(&[tier, outcome])
            .inc();
    }

    /// Record evicted entries.
    pub fn record_evictions(&self, tier: &str, count: usize) {
        if count > 0 {
            self.cache_evictions_total
                .with_label_values(&[tier])
                .inc_by(count as f64);
        }
    }

    /// Increment SSE subscriber count.
    pub fn sse_connected(&self) {
        self.sse_subscribers.inc();
    }

    /// Decrement SSE subscriber count.
    pub fn sse_disconnected(&self) {
        self.sse_subscribers.dec();
    }

    /// Record a published event.
    pub fn record_broadcast(&self, kind: &str) {
        self.broadcasts_total.with_label_values(&[kind]).inc();
    }

    /// Record a handler execution.
    pub fn record_handler_run(&self, endpoint: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        self.handler_runs_total
            .with_label_values(&[endpoint, status])
            .inc();
    }
}

/// Run `f` against the global metrics, if they registered.
pub fn with_metrics(f: impl FnOnce(&PanelMetrics)) {
    if let Ok(metrics) = METRICS.as_ref() {
        f(metrics);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
