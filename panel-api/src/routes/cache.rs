//! Cache Management Endpoints
//!
//! - GET /api/cache/status - Statistics for every tier
//! - POST /api/cache/clear - Empty the response and data caches
//!
//! Startup-once entries live for the process lifetime and are never
//! cleared through this surface.

use axum::{extract::State, routing::get, routing::post, Json, Router};
use panel_storage::{DataCacheStats, ResponseCacheStats, StartupCacheStats};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub connected_clients: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStatusResponse {
    pub status: &'static str,
    pub response_cache: ResponseCacheStats,
    pub data_cache: DataCacheStats,
    pub startup_cache: StartupCacheStats,
    pub server_info: ServerInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearedCounts {
    pub response_cache: usize,
    pub data_cache: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartupCacheNote {
    pub cleared: bool,
    pub cached_endpoints: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheClearResponse {
    pub status: &'static str,
    pub message: String,
    pub cleared: ClearedCounts,
    pub startup_cache: StartupCacheNote,
}

/// GET /api/cache/status
pub async fn cache_status(State(state): State<AppState>) -> Json<CacheStatusResponse> {
    Json(CacheStatusResponse {
        status: "success",
        response_cache: state.responses.stats(),
        data_cache: state.data.stats(),
        startup_cache: state.startup.stats(),
        server_info: ServerInfo {
            name: state.config.server.service_name.clone(),
            connected_clients: state.broadcaster.len(),
        },
    })
}

/// POST /api/cache/clear
pub async fn cache_clear(State(state): State<AppState>) -> Json<CacheClearResponse> {
    let response_cache = state.responses.clear();
    let data_cache = state.data.clear();
    let message = format!(
        "Cache cleared: removed {} response entries and {} data entries",
        response_cache, data_cache
    );
    tracing::info!(response_cache, data_cache, "Caches cleared on request");

    Json(CacheClearResponse {
        status: "success",
        message,
        cleared: ClearedCounts {
            response_cache,
            data_cache,
        },
        startup_cache: StartupCacheNote {
            cleared: false,
            cached_endpoints: state.startup.len(),
        },
    })
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api/cache/status", get(cache_status))
        .route("/api/cache/clear", post(cache_clear))
}
