//! Typed Handler Registry
//!
//! Maps endpoint paths to dashboard handlers and the cache strategy that
//! protects them. Built once at startup; lookups of unregistered paths
//! fail with [`RegistryError::UnknownEndpoint`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use panel_core::{unix_seconds, HandlerError, Params, RegistryError};
use panel_storage::DataCache;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::{AppConfig, DataSourceConfig};
use crate::constants::{CHART_DATA_PREFIX, DASHBOARD_CONFIG_PATH, TABLE_DATA_PREFIX};

// ============================================================================
// HANDLER TRAIT
// ============================================================================

/// Everything a handler may read while computing a payload.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub endpoint: String,
    pub params: Params,
    pub data: Arc<DataCache>,
}

/// A business handler whose output is protected by one of the cache tiers.
#[async_trait]
pub trait DashboardHandler: Send + Sync {
    /// Compute the payload for one request.
    async fn compute(&self, ctx: &HandlerContext) -> Result<Value, HandlerError>;

    /// Summary of the inputs the payload depends on. The response cache
    /// reuses a payload while this summary's fingerprint is unchanged.
    /// `None` selects the default summary.
    fn source_summary(&self, _ctx: &HandlerContext) -> Option<Value> {
        None
    }
}

/// Which cache tier protects an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStrategy {
    /// Computed at most once per process.
    StartupOnce,
    /// Reused while the source summary fingerprint is unchanged.
    ResponseCache,
    /// Always recomputed.
    None,
}

/// A registered endpoint.
#[derive(Clone)]
pub struct RegisteredEndpoint {
    pub path: String,
    pub strategy: CacheStrategy,
    /// Startup-once endpoints called with parameters fall back to the
    /// response cache when this is set.
    pub parameterized: bool,
    pub description: String,
    pub handler: Arc<dyn DashboardHandler>,
}

impl RegisteredEndpoint {
    pub fn new(
        path: impl Into<String>,
        strategy: CacheStrategy,
        handler: Arc<dyn DashboardHandler>,
    ) -> Self {
        Self {
            path: path.into(),
            strategy,
            parameterized: false,
            description: String::new(),
            handler,
        }
    }

    pub fn parameterized(mut self, parameterized: bool) -> Self {
        self.parameterized = parameterized;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Strategy actually used for a request with `params`.
    pub fn effective_strategy(&self, params: &Params) -> CacheStrategy {
        match self.strategy {
            CacheStrategy::StartupOnce if self.parameterized && !params.is_empty() => {
                CacheStrategy::ResponseCache
            }
            other => other,
        }
    }
}

impl fmt::Debug for RegisteredEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredEndpoint")
            .field("path", &self.path)
            .field("strategy", &self.strategy)
            .field("parameterized", &self.parameterized)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Public listing entry for the system info endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointInfo {
    pub path: String,
    pub strategy: CacheStrategy,
    pub parameterized: bool,
    pub description: String,
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Endpoint path to handler map.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    endpoints: BTreeMap<String, RegisteredEndpoint>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint. Fails if the path is already taken.
    pub fn register(&mut self, endpoint: RegisteredEndpoint) -> Result<(), RegistryError> {
        if self.endpoints.contains_key(&endpoint.path) {
            return Err(RegistryError::DuplicateEndpoint {
                endpoint: endpoint.path,
            });
        }
        tracing::debug!(
            path = %endpoint.path,
            strategy = ?endpoint.strategy,
            parameterized = endpoint.parameterized,
            "Registered endpoint"
        );
        self.endpoints.insert(endpoint.path.clone(), endpoint);
        Ok(())
    }

    pub fn lookup(&self, path: &str) -> Result<&RegisteredEndpoint, RegistryError> {
        self.endpoints
            .get(path)
            .ok_or_else(|| RegistryError::UnknownEndpoint {
                endpoint: path.to_string(),
            })
    }

    /// Registered paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.endpoints.keys().cloned().collect()
    }

    pub fn describe(&self) -> Vec<EndpointInfo> {
        self.endpoints
            .values()
            .map(|e| EndpointInfo {
                path: e.path.clone(),
                strategy: e.strategy,
                parameterized: e.parameterized,
                description: e.description.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

// ============================================================================
// PARAMETER HELPERS
// ============================================================================

/// Read the optional `limit` parameter. Accepts a number or a numeric
/// string, as query strings deliver every value as a string.
fn limit_param(params: &Params) -> Result<Option<usize>, HandlerError> {
    let Some(raw) = params.get("limit") else {
        return Ok(None);
    };
    let parsed = match raw {
        Value::Number(n) => n.as_u64().map(|v| v as usize),
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    };
    parsed.map(Some).ok_or_else(|| HandlerError::InvalidParams {
        reason: format!("limit must be a non-negative integer, got {}", raw),
    })
}

fn truncate(rows: &mut Vec<Value>, limit: Option<usize>) {
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
}

/// Summary shared by the snapshot handlers: the source's current mtime,
/// or the recorded stamp of injected content when no source is registered.
fn snapshot_summary(key: &str, data: &DataCache) -> Value {
    let stamp = data
        .source_modified(key)
        .map(unix_seconds)
        .or_else(|| data.timestamps().get(key).copied());
    json!({ "source": key, "mtime": stamp })
}

// ============================================================================
// TABLE SNAPSHOTS
// ============================================================================

/// Serves a data cache entry as `{columns, data, metadata}`.
///
/// Accepts an array of row objects, an array of row arrays, or an object
/// already carrying `columns` and `data`. An empty artifact is an empty table.
#[derive(Debug, Clone)]
pub struct SnapshotTableHandler {
    key: String,
}

impl SnapshotTableHandler {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Convert a snapshot into `(columns, rows)`.
fn shape_table(endpoint: &str, content: Value) -> Result<(Vec<Value>, Vec<Value>), HandlerError> {
    match content {
        Value::Null => Ok((Vec::new(), Vec::new())),
        Value::Array(rows) if rows.iter().all(Value::is_object) => {
            let mut columns: Vec<String> = Vec::new();
            for row in &rows {
                if let Value::Object(map) = row {
                    for key in map.keys() {
                        if !columns.contains(key) {
                            columns.push(key.clone());
                        }
                    }
                }
            }
            let data = rows
                .iter()
                .map(|row| {
                    Value::Array(
                        columns
                            .iter()
                            .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                            .collect(),
                    )
                })
                .collect();
            Ok((columns.into_iter().map(Value::String).collect(), data))
        }
        Value::Array(rows) if rows.iter().all(Value::is_array) => Ok((Vec::new(), rows)),
        Value::Object(mut map) => match (map.remove("columns"), map.remove("data")) {
            (Some(Value::Array(columns)), Some(Value::Array(data))) => Ok((columns, data)),
            _ => Err(HandlerError::failed(
                endpoint,
                "table snapshot object needs `columns` and `data` arrays",
            )),
        },
        _ => Err(HandlerError::failed(endpoint, "unsupported table snapshot shape")),
    }
}

#[async_trait]
impl DashboardHandler for SnapshotTableHandler {
    async fn compute(&self, ctx: &HandlerContext) -> Result<Value, HandlerError> {
        let limit = limit_param(&ctx.params)?;
        let (columns, mut data) = shape_table(&ctx.endpoint, ctx.data.load(&self.key))?;
        let total_rows = data.len();
        truncate(&mut data, limit);

        Ok(json!({
            "columns": columns,
            "data": data,
            "metadata": {
                "source": self.key,
                "total_rows": total_rows,
                "row_count": data.len(),
                "generated_at": Utc::now(),
            },
        }))
    }

    fn source_summary(&self, ctx: &HandlerContext) -> Option<Value> {
        Some(snapshot_summary(&self.key, &ctx.data))
    }
}

// ============================================================================
// CHART SNAPSHOTS
// ============================================================================

/// Serves a chart snapshot as stored. With `limit`, only the first points
/// of a top-level array (or of its `data` array) are kept.
#[derive(Debug, Clone)]
pub struct SnapshotChartHandler {
    key: String,
}

impl SnapshotChartHandler {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[async_trait]
impl DashboardHandler for SnapshotChartHandler {
    async fn compute(&self, ctx: &HandlerContext) -> Result<Value, HandlerError> {
        let limit = limit_param(&ctx.params)?;
        match ctx.data.load(&self.key) {
            Value::Null => Err(HandlerError::SourceUnavailable {
                key: self.key.clone(),
            }),
            Value::Array(mut points) => {
                truncate(&mut points, limit);
                Ok(Value::Array(points))
            }
            Value::Object(mut chart) => {
                if let Some(Value::Array(points)) = chart.get_mut("data") {
                    truncate(points, limit);
                }
                Ok(Value::Object(chart))
            }
            scalar => Ok(scalar),
        }
    }

    fn source_summary(&self, ctx: &HandlerContext) -> Option<Value> {
        Some(snapshot_summary(&self.key, &ctx.data))
    }
}

// ============================================================================
// DASHBOARD LAYOUT
// ============================================================================

/// Builds the dashboard layout from the configured data sources.
#[derive(Debug, Clone)]
pub struct DashboardConfigHandler {
    sources: DataSourceConfig,
    auto_components: Vec<String>,
}

impl DashboardConfigHandler {
    pub fn new(sources: DataSourceConfig, auto_components: Vec<String>) -> Self {
        Self {
            sources,
            auto_components,
        }
    }

    fn component(&self, id: &str, kind: &str, prefix: &str) -> Value {
        json!({
            "id": id,
            "type": kind,
            "dataSource": format!("{}{}", prefix, id),
            "autoUpdate": self.auto_components.iter().any(|c| c == id),
        })
    }
}

#[async_trait]
impl DashboardHandler for DashboardConfigHandler {
    async fn compute(&self, ctx: &HandlerContext) -> Result<Value, HandlerError> {
        let kind = ctx.params.get("type").and_then(Value::as_str);
        if let Some(kind) = kind {
            if kind != "table" && kind != "chart" {
                return Err(HandlerError::InvalidParams {
                    reason: format!("type must be `table` or `chart`, got `{}`", kind),
                });
            }
        }

        let mut components = Vec::new();
        if kind != Some("chart") {
            components.extend(
                self.sources
                    .tables
                    .keys()
                    .map(|k| self.component(k, "table", TABLE_DATA_PREFIX)),
            );
        }
        if kind != Some("table") {
            components.extend(
                self.sources
                    .charts
                    .keys()
                    .map(|k| self.component(k, "chart", CHART_DATA_PREFIX)),
            );
        }

        let mut metadata = Map::new();
        metadata.insert("component_count".to_string(), json!(components.len()));
        metadata.insert("generated_at".to_string(), json!(Utc::now()));

        Ok(json!({
            "layout": { "components": components },
            "metadata": metadata,
        }))
    }
}

// ============================================================================
// DEFAULT REGISTRY
// ============================================================================

/// Register every configured snapshot with `data` and build the registry
/// serving them.
pub fn default_registry(
    config: &AppConfig,
    data: &DataCache,
) -> Result<HandlerRegistry, RegistryError> {
    let mut registry = HandlerRegistry::new();
    let sources = &config.sources;

    for (key, path) in &sources.tables {
        data.add_source(key.clone(), path.clone());
        registry.register(
            RegisteredEndpoint::new(
                format!("{}{}", TABLE_DATA_PREFIX, key),
                CacheStrategy::ResponseCache,
                Arc::new(SnapshotTableHandler::new(key.clone())),
            )
            .parameterized(true)
            .with_description(format!("Table snapshot `{}`", key)),
        )?;
    }

    for (key, path) in &sources.charts {
        // Prefixed so chart keys never collide with table keys.
        let cache_key = format!("chart:{}", key);
        data.add_source(cache_key.clone(), path.clone());
        registry.register(
            RegisteredEndpoint::new(
                format!("{}{}", CHART_DATA_PREFIX, key),
                CacheStrategy::StartupOnce,
                Arc::new(SnapshotChartHandler::new(cache_key)),
            )
            .parameterized(true)
            .with_description(format!("Chart snapshot `{}`", key)),
        )?;
    }

    registry.register(
        RegisteredEndpoint::new(
            DASHBOARD_CONFIG_PATH,
            CacheStrategy::StartupOnce,
            Arc::new(DashboardConfigHandler::new(
                sources.clone(),
                config.auto_update.components.clone(),
            )),
        )
        .parameterized(true)
        .with_description("Dashboard layout"),
    )?;

    tracing::info!(endpoints = registry.len(), "Handler registry built");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_test_utils::{sample_rows, CountingSource};

    fn ctx(endpoint: &str, params: Params, data: Arc<DataCache>) -> HandlerContext {
        HandlerContext {
            endpoint: endpoint.to_string(),
            params,
            data,
        }
    }

    fn params(pairs: &[(&str, Value)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    struct Fixed;

    #[async_trait]
    impl DashboardHandler for Fixed {
        async fn compute(&self, _ctx: &HandlerContext) -> Result<Value, HandlerError> {
            Ok(json!(1))
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = HandlerRegistry::new();
        assert!(registry
            .register(RegisteredEndpoint::new("/a", CacheStrategy::None, Arc::new(Fixed)))
            .is_ok());

        let duplicate =
            registry.register(RegisteredEndpoint::new("/a", CacheStrategy::None, Arc::new(Fixed)));
        assert_eq!(
            duplicate,
            Err(RegistryError::DuplicateEndpoint {
                endpoint: "/a".to_string()
            })
        );

        assert!(registry.lookup("/a").is_ok());
        assert_eq!(
            registry.lookup("/b").err(),
            Some(RegistryError::UnknownEndpoint {
                endpoint: "/b".to_string()
            })
        );
        assert_eq!(registry.paths(), vec!["/a"]);
    }

    #[test]
    fn test_effective_strategy_escape_hatch() {
        let endpoint =
            RegisteredEndpoint::new("/c", CacheStrategy::StartupOnce, Arc::new(Fixed));
        let with_params = params(&[("range", json!("1d"))]);

        assert_eq!(endpoint.effective_strategy(&with_params), CacheStrategy::StartupOnce);

        let endpoint = endpoint.parameterized(true);
        assert_eq!(endpoint.effective_strategy(&Params::new()), CacheStrategy::StartupOnce);
        assert_eq!(
            endpoint.effective_strategy(&with_params),
            CacheStrategy::ResponseCache
        );
    }

    #[tokio::test]
    async fn test_table_handler_shapes_rows() -> Result<(), HandlerError> {
        let data = Arc::new(DataCache::new());
        data.update("stocks", sample_rows());
        let handler = SnapshotTableHandler::new("stocks");

        let out = handler
            .compute(&ctx("/api/table-data/stocks", Params::new(), data.clone()))
            .await?;
        let columns = out["columns"].as_array().map(Vec::len);
        assert_eq!(columns, Some(3));
        assert_eq!(out["data"].as_array().map(Vec::len), Some(3));
        assert_eq!(out["metadata"]["total_rows"], 3);

        let limited = handler
            .compute(&ctx(
                "/api/table-data/stocks",
                params(&[("limit", json!("2"))]),
                data,
            ))
            .await?;
        assert_eq!(limited["data"].as_array().map(Vec::len), Some(2));
        assert_eq!(limited["metadata"]["total_rows"], 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_table_handler_empty_and_passthrough() -> Result<(), HandlerError> {
        let data = Arc::new(DataCache::new());
        let handler = SnapshotTableHandler::new("missing");
        let out = handler
            .compute(&ctx("/api/table-data/missing", Params::new(), data.clone()))
            .await?;
        assert_eq!(out["columns"], json!([]));
        assert_eq!(out["data"], json!([]));

        data.update("ready", json!({"columns": ["a"], "data": [[1], [2]]}));
        let out = SnapshotTableHandler::new("ready")
            .compute(&ctx("/api/table-data/ready", Params::new(), data))
            .await?;
        assert_eq!(out["columns"], json!(["a"]));
        assert_eq!(out["data"], json!([[1], [2]]));
        Ok(())
    }

    #[tokio::test]
    async fn test_table_handler_rejects_bad_input() {
        let data = Arc::new(DataCache::new());
        data.update("odd", json!("just a string"));

        let shape = SnapshotTableHandler::new("odd")
            .compute(&ctx("/api/table-data/odd", Params::new(), data.clone()))
            .await;
        assert!(matches!(shape, Err(HandlerError::Failed { .. })));

        let limit = SnapshotTableHandler::new("odd")
            .compute(&ctx(
                "/api/table-data/odd",
                params(&[("limit", json!("many"))]),
                data,
            ))
            .await;
        assert!(matches!(limit, Err(HandlerError::InvalidParams { .. })));
    }

    #[tokio::test]
    async fn test_chart_handler() -> Result<(), HandlerError> {
        let data = Arc::new(DataCache::new());
        let handler = SnapshotChartHandler::new("chart:trend");

        let missing = handler
            .compute(&ctx("/api/chart-data/trend", Params::new(), data.clone()))
            .await;
        assert!(matches!(missing, Err(HandlerError::SourceUnavailable { .. })));

        data.update("chart:trend", json!({"title": "t", "data": [1, 2, 3, 4]}));
        let out = handler
            .compute(&ctx(
                "/api/chart-data/trend",
                params(&[("limit", json!(2))]),
                data,
            ))
            .await?;
        assert_eq!(out, json!({"title": "t", "data": [1, 2]}));
        Ok(())
    }

    #[test]
    fn test_snapshot_summary_tracks_mtime() {
        let data = Arc::new(DataCache::new());
        let spy = CountingSource::new(100, &json!([]));
        data.register_source("k", spy.clone());
        let handler = SnapshotTableHandler::new("k");
        let context = ctx("/api/table-data/k", Params::new(), data);

        let before = handler.source_summary(&context);
        spy.modify(200, &json!([1]));
        let after = handler.source_summary(&context);
        assert_ne!(before, after);
        assert_eq!(after, Some(json!({"source": "k", "mtime": 200.0})));
    }

    #[tokio::test]
    async fn test_dashboard_config_handler() -> Result<(), HandlerError> {
        let sources = DataSourceConfig::default()
            .with_table("table1", "/tmp/t1.json")
            .with_chart("chart1", "/tmp/c1.json");
        let handler = DashboardConfigHandler::new(sources, vec!["chart1".to_string()]);
        let data = Arc::new(DataCache::new());

        let out = handler
            .compute(&ctx(DASHBOARD_CONFIG_PATH, Params::new(), data.clone()))
            .await?;
        assert_eq!(out["metadata"]["component_count"], 2);
        assert_eq!(out["layout"]["components"][1]["autoUpdate"], true);
        assert_eq!(
            out["layout"]["components"][0]["dataSource"],
            "/api/table-data/table1"
        );

        let charts = handler
            .compute(&ctx(
                DASHBOARD_CONFIG_PATH,
                params(&[("type", json!("chart"))]),
                data.clone(),
            ))
            .await?;
        assert_eq!(charts["metadata"]["component_count"], 1);

        let bad = handler
            .compute(&ctx(
                DASHBOARD_CONFIG_PATH,
                params(&[("type", json!("map"))]),
                data,
            ))
            .await;
        assert!(matches!(bad, Err(HandlerError::InvalidParams { .. })));
        Ok(())
    }

    #[test]
    fn test_default_registry_registers_sources() -> Result<(), RegistryError> {
        let mut config = AppConfig::development();
        config.sources = DataSourceConfig::default()
            .with_table("stocks", "/tmp/stocks.json")
            .with_chart("trend", "/tmp/trend.json");
        let data = DataCache::new();

        let registry = default_registry(&config, &data)?;
        assert_eq!(
            registry.paths(),
            vec![
                "/api/chart-data/trend",
                "/api/dashboard-config",
                "/api/table-data/stocks",
            ]
        );
        assert!(data.has_source("stocks"));
        assert!(data.has_source("chart:trend"));
        assert_eq!(
            registry.lookup("/api/chart-data/trend")?.strategy,
            CacheStrategy::StartupOnce
        );
        Ok(())
    }
}
