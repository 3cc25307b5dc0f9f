//! Health and System Info Endpoints
//!
//! - GET /health - Liveness with subscriber count
//! - GET /api/system/info - Service description and endpoint listing

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::constants::SERVICE_VERSION;
use crate::registry::EndpointInfo;
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub connected_clients: usize,
    pub uptime_seconds: u64,
}

/// System info response
#[derive(Debug, Clone, Serialize)]
pub struct SystemInfoResponse {
    pub name: String,
    pub version: String,
    pub description: String,
    pub features: Vec<&'static str>,
    pub endpoints: serde_json::Value,
    pub registered_endpoints: Vec<EndpointInfo>,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        service: state.config.server.service_name.clone(),
        version: SERVICE_VERSION.to_string(),
        timestamp: panel_core::now_ms(),
        connected_clients: state.broadcaster.len(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    };
    (StatusCode::OK, Json(response))
}

/// GET /api/system/info
pub async fn system_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(SystemInfoResponse {
        name: state.config.server.service_name.clone(),
        version: SERVICE_VERSION.to_string(),
        description: "Dashboard data service with tiered caching and live updates".to_string(),
        features: vec![
            "mtime-revalidated data cache",
            "fingerprint-revalidated response cache",
            "startup-once cache",
            "server-sent event updates",
        ],
        endpoints: json!({
            "dashboard-config": "/api/dashboard-config",
            "table-data": "/api/table-data/:name",
            "chart-data": "/api/chart-data/:name",
            "dashboard-update": "/api/dashboard/update",
            "dashboard-updates": "/api/dashboard/updates",
            "cache-status": "/api/cache/status",
            "cache-clear": "/api/cache/clear",
            "auto-update": "/api/auto-update/config",
            "health": "/health",
        }),
        registered_endpoints: state.registry.describe(),
    })
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/system/info", get(system_info))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_serialization() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&HealthStatus::Healthy)?, "\"healthy\"");
        Ok(())
    }
}
