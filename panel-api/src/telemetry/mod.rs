//! Panel Telemetry - Observability Infrastructure
//!
//! Provides structured tracing and Prometheus metrics for the API layer.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics_handler, PanelMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracing, shutdown_tracing, TelemetryConfig};
