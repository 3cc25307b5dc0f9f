//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use panel_events::Broadcaster;
use panel_storage::{DataCache, ResponseCache, StartupCache};

use crate::config::AppConfig;
use crate::error::ApiResult;
use crate::jobs::RefreshCoordinator;
use crate::registry::{default_registry, HandlerRegistry};

/// Application-wide state shared across all routes.
///
/// Every tier is constructed here and injected into handlers; there are no
/// process globals besides the metrics registry.
#[derive(Clone)]
pub struct AppState {
    /// Startup configuration. Auto-update settings here are the initial
    /// values; the live ones are owned by `refresh`.
    pub config: Arc<AppConfig>,
    /// Decoded source artifacts, revalidated by mtime.
    pub data: Arc<DataCache>,
    /// Computed payloads, revalidated by source summary fingerprint.
    pub responses: Arc<ResponseCache>,
    /// Payloads computed once per process.
    pub startup: Arc<StartupCache>,
    /// Live SSE subscribers.
    pub broadcaster: Broadcaster,
    pub registry: Arc<HandlerRegistry>,
    pub refresh: Arc<RefreshCoordinator>,
    pub start_time: Instant,
}

crate::impl_from_ref!(Arc<DataCache>, data);
crate::impl_from_ref!(Arc<ResponseCache>, responses);
crate::impl_from_ref!(Arc<StartupCache>, startup);
crate::impl_from_ref!(Broadcaster, broadcaster);
crate::impl_from_ref!(Arc<HandlerRegistry>, registry);
crate::impl_from_ref!(Arc<RefreshCoordinator>, refresh);
crate::impl_from_ref!(Instant, start_time);

impl AppState {
    /// Assemble state from a prepared data cache and registry. Does not
    /// start the refresh coordinator.
    pub fn new(config: AppConfig, data: Arc<DataCache>, registry: HandlerRegistry) -> Self {
        let broadcaster = Broadcaster::new();
        let refresh = Arc::new(RefreshCoordinator::new(
            config.auto_update.clone(),
            broadcaster.clone(),
            data.clone(),
        ));
        Self {
            responses: Arc::new(ResponseCache::new(config.cache.clone())),
            startup: Arc::new(StartupCache::new()),
            config: Arc::new(config),
            data,
            broadcaster,
            registry: Arc::new(registry),
            refresh,
            start_time: Instant::now(),
        }
    }

    /// Build every tier, register the configured snapshots and start the
    /// refresh coordinator if enabled. Must be called within a Tokio runtime.
    pub fn init(config: AppConfig) -> ApiResult<Self> {
        let data = Arc::new(DataCache::new());
        let registry = default_registry(&config, &data)?;
        let state = Self::new(config, data, registry);

        if state.config.auto_update.enabled {
            state.refresh.ensure_running();
        }

        tracing::info!(
            endpoints = state.registry.len(),
            sources = state.data.source_keys().len(),
            max_cache_size = state.config.cache.max_entries,
            auto_update = state.config.auto_update.enabled,
            "Application state initialized"
        );
        Ok(state)
    }

    /// Stop the refresh coordinator and empty every tier.
    pub async fn teardown(&self) {
        self.refresh.shutdown().await;
        let responses = self.responses.clear();
        let data = self.data.clear();
        let startup = self.startup.clear();
        tracing::info!(responses, data, startup, "Application state torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataSourceConfig;
    use crate::error::ApiError;
    use panel_test_utils::{sample_rows, SnapshotDir};
    use serde_json::json;

    #[tokio::test]
    async fn test_init_registers_sources_and_teardown_clears() -> Result<(), ApiError> {
        let dir = SnapshotDir::new().map_err(|e| ApiError::internal_error(e.to_string()))?;
        let path = dir
            .write("stocks", &sample_rows())
            .map_err(|e| ApiError::internal_error(e.to_string()))?;

        let mut config = AppConfig::development();
        config.sources = DataSourceConfig::default().with_table("stocks", path);
        let state = AppState::init(config)?;

        assert!(state.data.has_source("stocks"));
        assert!(state.registry.lookup("/api/table-data/stocks").is_ok());
        assert!(!state.refresh.is_running());

        state.data.load("stocks");
        state.startup.set("/x", json!(1));
        state.teardown().await;
        assert!(!state.data.contains("stocks"));
        assert!(state.startup.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_init_starts_coordinator_when_enabled() -> Result<(), ApiError> {
        let mut config = AppConfig::development();
        config.auto_update.enabled = true;
        let state = AppState::init(config)?;
        assert!(state.refresh.is_running());
        state.teardown().await;
        assert!(!state.refresh.is_running());
        Ok(())
    }
}
