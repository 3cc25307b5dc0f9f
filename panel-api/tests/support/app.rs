//! Shared fixtures for router-level tests.

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use panel_api::{create_router, ApiError, AppConfig, AppState, DataSourceConfig};
use panel_test_utils::{sample_rows, SnapshotDir};
use serde_json::{json, Value};
use tower::ServiceExt;

/// A running router over a temp directory holding one table (`stocks`)
/// and one chart (`prices`).
pub struct TestApp {
    pub dir: SnapshotDir,
    pub state: AppState,
    pub router: Router,
}

fn io_err(e: std::io::Error) -> ApiError {
    ApiError::internal_error(e.to_string())
}

pub fn prices() -> Value {
    json!([
        {"t": 1, "v": 10.0},
        {"t": 2, "v": 11.5},
        {"t": 3, "v": 9.75},
        {"t": 4, "v": 12.0}
    ])
}

pub fn test_app() -> Result<TestApp, ApiError> {
    let dir = SnapshotDir::new().map_err(io_err)?;
    let stocks = dir.write("stocks", &sample_rows()).map_err(io_err)?;
    let chart = dir.write("prices", &prices()).map_err(io_err)?;

    let mut config = AppConfig::development();
    config.sources = DataSourceConfig::default()
        .with_table("stocks", stocks)
        .with_chart("prices", chart);

    let state = AppState::init(config)?;
    let router = create_router(state.clone());
    Ok(TestApp { dir, state, router })
}

impl TestApp {
    /// Send a request and decode the JSON body.
    pub async fn call(&self, request: Request<Body>) -> Result<(StatusCode, Value), ApiError> {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .map_err(|e| ApiError::internal_error(e.to_string()))?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| ApiError::internal_error(e.to_string()))?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, body))
    }

    pub async fn get(&self, uri: &str) -> Result<(StatusCode, Value), ApiError> {
        let request = Request::get(uri)
            .body(Body::empty())
            .map_err(|e| ApiError::internal_error(e.to_string()))?;
        self.call(request).await
    }

    pub async fn send_json(
        &self,
        method: &str,
        uri: &str,
        body: &Value,
    ) -> Result<(StatusCode, Value), ApiError> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .map_err(|e| ApiError::internal_error(e.to_string()))?;
        self.call(request).await
    }

    pub async fn post_empty(&self, uri: &str) -> Result<(StatusCode, Value), ApiError> {
        let request = Request::post(uri)
            .body(Body::empty())
            .map_err(|e| ApiError::internal_error(e.to_string()))?;
        self.call(request).await
    }
}
