//! Auto-Update Control Endpoints
//!
//! - GET /api/auto-update/config - Live configuration
//! - PUT /api/auto-update/config - Partial configuration update
//! - GET /api/auto-update/status - Coordinator state
//! - POST /api/auto-update/toggle - Flip the enabled flag

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::config::{AutoUpdateConfig, AutoUpdatePatch};
use crate::error::ApiResult;
use crate::jobs::RefreshSnapshot;
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AutoUpdateServerInfo {
    pub name: String,
    pub port: u16,
    pub sse_clients: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigResponse {
    pub status: &'static str,
    pub config: AutoUpdateConfig,
    pub server_info: AutoUpdateServerInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigUpdateResponse {
    pub status: &'static str,
    pub message: String,
    pub config: AutoUpdateConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutoUpdateStatus {
    pub enabled: bool,
    pub thread_running: bool,
    pub interval: u64,
    pub components: Vec<String>,
    pub sse_clients: usize,
    pub max_clients: usize,
    pub cycles: RefreshSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub auto_update: AutoUpdateStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToggleResponse {
    pub status: &'static str,
    pub message: String,
    pub enabled: bool,
    pub thread_running: bool,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /api/auto-update/config
pub async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        status: "success",
        config: state.refresh.config().await,
        server_info: AutoUpdateServerInfo {
            name: state.config.server.service_name.clone(),
            port: state.config.server.port,
            sse_clients: state.broadcaster.len(),
        },
    })
}

/// PUT /api/auto-update/config
pub async fn update_config(
    State(state): State<AppState>,
    payload: Result<Json<AutoUpdatePatch>, JsonRejection>,
) -> ApiResult<Json<ConfigUpdateResponse>> {
    let Json(patch) = payload?;
    let config = state.refresh.update_config(patch).await?;
    Ok(Json(ConfigUpdateResponse {
        status: "success",
        message: "Configuration updated".to_string(),
        config,
    }))
}

/// GET /api/auto-update/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let config = state.refresh.config().await;
    Json(StatusResponse {
        status: "success",
        auto_update: AutoUpdateStatus {
            enabled: config.enabled,
            thread_running: state.refresh.is_running(),
            interval: config.interval,
            components: config.components,
            sse_clients: state.broadcaster.len(),
            max_clients: config.max_clients,
            cycles: state.refresh.metrics(),
        },
    })
}

/// POST /api/auto-update/toggle
pub async fn toggle(State(state): State<AppState>) -> Json<ToggleResponse> {
    let config = state.refresh.toggle().await;
    let message = if config.enabled {
        "Auto-update enabled"
    } else {
        "Auto-update disabled"
    };
    Json(ToggleResponse {
        status: "success",
        message: message.to_string(),
        enabled: config.enabled,
        thread_running: state.refresh.is_running(),
    })
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api/auto-update/config", get(get_config).put(update_config))
        .route("/api/auto-update/status", get(get_status))
        .route("/api/auto-update/toggle", post(toggle))
}
