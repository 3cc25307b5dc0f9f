//! Dashboard Data Endpoints
//!
//! Every request is dispatched through the handler registry and served
//! by the cache tier its endpoint was registered with.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use panel_core::Params;
use serde_json::Value;

use crate::constants::{CHART_DATA_PREFIX, DASHBOARD_CONFIG_PATH, TABLE_DATA_PREFIX};
use crate::error::ApiResult;
use crate::protection::execute;
use crate::state::AppState;

/// Convert query string pairs into handler parameters.
pub fn query_params(query: BTreeMap<String, String>) -> Params {
    query
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect()
}

/// GET /api/table-data/:name
pub async fn table_data(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<BTreeMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let path = format!("{}{}", TABLE_DATA_PREFIX, name);
    execute(&state, &path, query_params(query)).await.map(Json)
}

/// GET /api/chart-data/:name
pub async fn chart_data(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<BTreeMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let path = format!("{}{}", CHART_DATA_PREFIX, name);
    execute(&state, &path, query_params(query)).await.map(Json)
}

/// GET /api/dashboard-config
pub async fn dashboard_config(
    State(state): State<AppState>,
    Query(query): Query<BTreeMap<String, String>>,
) -> ApiResult<Json<Value>> {
    execute(&state, DASHBOARD_CONFIG_PATH, query_params(query))
        .await
        .map(Json)
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api/table-data/:name", get(table_data))
        .route("/api/chart-data/:name", get(chart_data))
        .route(DASHBOARD_CONFIG_PATH, get(dashboard_config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params_are_strings() {
        let mut query = BTreeMap::new();
        query.insert("limit".to_string(), "5".to_string());
        let params = query_params(query);
        assert_eq!(params.get("limit"), Some(&Value::String("5".to_string())));
    }
}
