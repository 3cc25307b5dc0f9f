//! REST and SSE Route Module
//!
//! Includes:
//! - Snapshot data routes (tables, charts, dashboard layout)
//! - Live update push and SSE stream
//! - Cache status and clearing
//! - Auto-update control
//! - Health and system info
//! - CORS support for browser-based dashboards

pub mod auto_update;
pub mod cache;
pub mod dashboard;
pub mod data;
pub mod health;

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware, TelemetryConfig};

pub use auto_update::create_router as auto_update_router;
pub use cache::create_router as cache_router;
pub use dashboard::create_router as dashboard_router;
pub use data::create_router as data_router;
pub use health::create_router as health_router;

// ============================================================================
// CORS
// ============================================================================

/// Build the CORS layer from server configuration.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::CACHE_CONTROL])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any).allow_headers(Any)
    } else {
        tracing::info!(origins = ?config.cors_origins, "CORS: allowing configured origins");
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the complete dashboard router.
///
/// - Data routes at /api/table-data/:name, /api/chart-data/:name, /api/dashboard-config
/// - Live updates at /api/dashboard/*
/// - Cache management at /api/cache/*
/// - Auto-update control at /api/auto-update/*
/// - Health at /health, system info at /api/system/info
/// - Metrics at /metrics unless `PANEL_METRICS_ENABLED=false`
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.server);

    let mut router = Router::new()
        .merge(data_router())
        .merge(dashboard_router())
        .merge(cache_router())
        .merge(auto_update_router())
        .merge(health_router());
    if TelemetryConfig::default().metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .route_layer(from_fn(observability_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_builds_for_both_modes() {
        let mut config = ServerConfig::default();
        let _ = build_cors_layer(&config);
        config.cors_origins = vec!["http://localhost:3000".to_string()];
        let _ = build_cors_layer(&config);
    }
}
