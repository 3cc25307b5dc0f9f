//! Router-level tests for the data, cache, update and auto-update routes.

use axum::http::StatusCode;
use panel_api::ApiError;
use serde_json::json;

#[path = "support/app.rs"]
mod app_support;
use app_support::{prices, test_app};

// ============================================================================
// DATA ROUTES
// ============================================================================

#[tokio::test]
async fn test_table_data_served_and_cached() -> Result<(), ApiError> {
    let app = test_app()?;

    let (status, body) = app.get("/api/table-data/stocks").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["total_rows"], 3);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(3));
    assert_eq!(app.state.responses.len(), 1);

    let (_, again) = app.get("/api/table-data/stocks").await?;
    assert_eq!(again["data"], body["data"]);
    assert_eq!(app.state.responses.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_table_query_params_are_separate_entries() -> Result<(), ApiError> {
    let app = test_app()?;

    let (status, limited) = app.get("/api/table-data/stocks?limit=1").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(limited["metadata"]["row_count"], 1);
    assert_eq!(limited["metadata"]["total_rows"], 3);

    app.get("/api/table-data/stocks").await?;
    assert_eq!(app.state.responses.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_table_reflects_rewritten_snapshot() -> Result<(), ApiError> {
    let app = test_app()?;
    app.get("/api/table-data/stocks").await?;

    let rows = json!([{"code": "ZZZ", "name": "Only", "price": 1.0}]);
    app.dir
        .rewrite("stocks", &rows, 5)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let (_, body) = app.get("/api/table-data/stocks").await?;
    assert_eq!(body["metadata"]["total_rows"], 1);
    Ok(())
}

#[tokio::test]
async fn test_chart_is_computed_once() -> Result<(), ApiError> {
    let app = test_app()?;

    let (status, first) = app.get("/api/chart-data/prices").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, prices());
    assert!(app.state.startup.is_cached("/api/chart-data/prices"));

    let (_, second) = app.get("/api/chart-data/prices?limit=2").await?;
    assert_eq!(second.as_array().map(Vec::len), Some(2));
    assert_eq!(app.state.responses.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_dashboard_config_lists_components() -> Result<(), ApiError> {
    let app = test_app()?;

    let (status, body) = app.get("/api/dashboard-config").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["component_count"], 2);

    let (status, body) = app.get("/api/dashboard-config?type=chart").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["layout"]["components"].as_array().map(Vec::len), Some(1));

    let (status, _) = app.get("/api/dashboard-config?type=map").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_unknown_table_is_not_found() -> Result<(), ApiError> {
    let app = test_app()?;
    let (status, body) = app.get("/api/table-data/missing").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "UNKNOWN_ENDPOINT");
    assert!(app.state.responses.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_invalid_limit_is_bad_request() -> Result<(), ApiError> {
    let app = test_app()?;
    let (status, body) = app.get("/api/table-data/stocks?limit=lots").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
    assert!(app.state.responses.is_empty());
    Ok(())
}

// ============================================================================
// CACHE ROUTES
// ============================================================================

#[tokio::test]
async fn test_cache_status_and_clear() -> Result<(), ApiError> {
    let app = test_app()?;
    app.get("/api/table-data/stocks").await?;
    app.get("/api/chart-data/prices").await?;

    let (status, body) = app.get("/api/cache/status").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["response_cache"]["cache_size"], 1);
    assert_eq!(body["data_cache"]["data_cache_size"], 2);
    assert_eq!(body["startup_cache"]["cached_endpoints"], 1);
    assert_eq!(body["server_info"]["connected_clients"], 0);

    let (status, body) = app.post_empty("/api/cache/clear").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleared"]["response_cache"], 1);
    assert_eq!(body["cleared"]["data_cache"], 2);
    assert_eq!(body["startup_cache"]["cleared"], false);
    assert_eq!(body["startup_cache"]["cached_endpoints"], 1);

    assert!(app.state.responses.is_empty());
    assert!(app.state.startup.is_cached("/api/chart-data/prices"));
    Ok(())
}

// ============================================================================
// MANUAL UPDATES
// ============================================================================

#[tokio::test]
async fn test_update_reaches_subscriber() -> Result<(), ApiError> {
    let app = test_app()?;
    let mut handle = app.state.broadcaster.subscribe();

    let (status, body) = app
        .send_json(
            "POST",
            "/api/dashboard/update",
            &json!({"componentId": "chart1", "params": {"range": "1d"}}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["delivered"], 1);

    let event = handle.try_next();
    assert_eq!(event.as_ref().and_then(|e| e.component_id()), Some("chart1"));
    assert_eq!(event.map(|e| e.event_type()), Some("update"));
    Ok(())
}

#[tokio::test]
async fn test_update_without_component_is_rejected() -> Result<(), ApiError> {
    let app = test_app()?;
    let mut handle = app.state.broadcaster.subscribe();

    let (status, body) = app
        .send_json("POST", "/api/dashboard/update", &json!({"params": {}}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");
    assert!(handle.try_next().is_none());
    Ok(())
}

#[tokio::test]
async fn test_update_with_malformed_body_is_rejected() -> Result<(), ApiError> {
    let app = test_app()?;
    let request = axum::http::Request::post("/api/dashboard/update")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    let (status, _) = app.call(request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

// ============================================================================
// AUTO-UPDATE ROUTES
// ============================================================================

#[tokio::test]
async fn test_auto_update_config_roundtrip() -> Result<(), ApiError> {
    let app = test_app()?;

    let (status, body) = app.get("/api/auto-update/config").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["config"]["enabled"], false);

    let (status, body) = app
        .send_json(
            "PUT",
            "/api/auto-update/config",
            &json!({"interval": 5, "components": ["a", "b"]}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["config"]["interval"], 5);
    assert_eq!(body["config"]["components"], json!(["a", "b"]));

    let (status, _) = app
        .send_json("PUT", "/api/auto-update/config", &json!({"interval": 0}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.state.refresh.config().await.interval, 5);
    Ok(())
}

#[tokio::test]
async fn test_toggle_starts_and_reports_coordinator() -> Result<(), ApiError> {
    let app = test_app()?;

    let (status, body) = app.post_empty("/api/auto-update/toggle").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], true);
    assert_eq!(body["thread_running"], true);

    let (_, status_body) = app.get("/api/auto-update/status").await?;
    assert_eq!(status_body["auto_update"]["enabled"], true);
    assert_eq!(status_body["auto_update"]["thread_running"], true);

    let (_, body) = app.post_empty("/api/auto-update/toggle").await?;
    assert_eq!(body["enabled"], false);

    app.state.teardown().await;
    assert!(!app.state.refresh.is_running());
    Ok(())
}

// ============================================================================
// HEALTH
// ============================================================================

#[tokio::test]
async fn test_health_and_system_info() -> Result<(), ApiError> {
    let app = test_app()?;

    let (status, body) = app.get("/health").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.get("/api/system/info").await?;
    assert_eq!(status, StatusCode::OK);
    let registered = body["registered_endpoints"].as_array().map(Vec::len);
    assert_eq!(registered, Some(3));
    Ok(())
}
