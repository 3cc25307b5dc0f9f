//! Live Dashboard Updates
//!
//! - POST /api/dashboard/update - Push a manual component update
//! - GET /api/dashboard/updates - Server-Sent Events stream of updates
//!
//! Each SSE connection owns one broadcaster subscription. The stream yields
//! a heartbeat whenever the subscription stays quiet for the heartbeat
//! interval, and unsubscribes when the client disconnects.

use std::convert::Infallible;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::sse::{Event, Sse},
    routing::{get, post},
    Json, Router,
};
use futures_util::Stream;
use panel_core::Params;
use panel_events::DashboardEvent;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::telemetry::metrics::with_metrics;

// ============================================================================
// TYPES
// ============================================================================

/// Body of a manual update request.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRequest {
    #[serde(rename = "componentId", default)]
    pub component_id: Option<String>,
    #[serde(default)]
    pub params: Params,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub status: String,
    pub message: String,
    pub delivered: usize,
}

/// Keeps the subscriber gauge in step with open streams.
struct SubscriberGauge;

impl SubscriberGauge {
    fn connect() -> Self {
        with_metrics(|m| m.sse_connected());
        Self
    }
}

impl Drop for SubscriberGauge {
    fn drop(&mut self) {
        with_metrics(|m| m.sse_disconnected());
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /api/dashboard/update
pub async fn push_update(
    State(state): State<AppState>,
    payload: Result<Json<UpdateRequest>, JsonRejection>,
) -> ApiResult<Json<UpdateResponse>> {
    let Json(request) = payload?;
    let component_id = request
        .component_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::missing_field("componentId"))?;

    tracing::info!(
        component_id = %component_id,
        params = %serde_json::Value::Object(request.params.clone()),
        "Manual update received"
    );

    let delivered = state
        .broadcaster
        .publish_latest(DashboardEvent::update(component_id, request.params));
    with_metrics(|m| m.record_broadcast("update"));

    Ok(Json(UpdateResponse {
        status: "success".to_string(),
        message: "Update sent".to_string(),
        delivered,
    }))
}

/// GET /api/dashboard/updates
pub async fn updates_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let heartbeat = state.refresh.config().await.heartbeat_duration();
    let mut handle = state.broadcaster.subscribe();
    let gauge = SubscriberGauge::connect();
    tracing::info!(
        subscriber_id = %handle.id(),
        subscribers = state.broadcaster.len(),
        "SSE client connected"
    );

    let stream = async_stream::stream! {
        let _gauge = gauge;
        while let Some(event) = handle.next_event(heartbeat).await {
            yield Ok(Event::default().data(event.to_json().to_string()));
        }
        tracing::debug!(subscriber_id = %handle.id(), "SSE stream ended");
    };

    Sse::new(stream)
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api/dashboard/update", post(push_update))
        .route("/api/dashboard/updates", get(updates_stream))
}
