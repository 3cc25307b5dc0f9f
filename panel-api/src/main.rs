//! Panel API Server Entry Point
//!
//! Loads configuration from the environment, builds the cache tiers and
//! starts the Axum HTTP server.

use axum::Router;
use panel_api::telemetry::{init_tracing, shutdown_tracing, TelemetryConfig};
use panel_api::{create_router, ApiError, ApiResult, AppConfig, AppState};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let config = AppConfig::from_env();
    let addr = config.server.bind_addr()?;
    let state = AppState::init(config)?;
    let app: Router = create_router(state.clone());

    tracing::info!(%addr, "Starting Panel API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    state.teardown().await;
    shutdown_tracing();
    Ok(())
}
