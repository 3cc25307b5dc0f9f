//! API Configuration Module
//!
//! Server, cache, data source and auto-update settings. Configuration is
//! loaded from environment variables with sensible defaults for development.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use panel_storage::CacheConfig;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{ApiError, ApiResult};

// ============================================================================
// ENV HELPERS
// ============================================================================

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| parse_flag(&s, default))
        .unwrap_or(default)
}

fn parse_flag(value: &str, default: bool) -> bool {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => default,
    }
}

/// Split a comma-separated list, dropping blanks.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse `key=path,key=path` pairs. Malformed items are skipped.
fn parse_source_map(value: &str) -> BTreeMap<String, PathBuf> {
    value
        .split(',')
        .filter_map(|item| {
            let (key, path) = item.split_once('=')?;
            let (key, path) = (key.trim(), path.trim());
            if key.is_empty() || path.is_empty() {
                tracing::warn!(item = %item, "Ignoring malformed data source entry");
                return None;
            }
            Some((key.to_string(), PathBuf::from(path)))
        })
        .collect()
}

// ============================================================================
// SERVER CONFIGURATION
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind.
    pub bind_host: String,

    /// Port to bind.
    pub port: u16,

    /// Name reported by health and status endpoints.
    pub service_name: String,

    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            cors_origins: Vec::new(),
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
        }
    }
}

impl ServerConfig {
    /// Create ServerConfig from environment variables.
    ///
    /// Environment variables:
    /// - `PANEL_API_BIND`: Bind host (default: 0.0.0.0)
    /// - `PORT`, then `PANEL_API_PORT`: Port (default: 5004)
    /// - `PANEL_SERVICE_NAME`: Reported service name
    /// - `PANEL_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `PANEL_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_host: std::env::var("PANEL_API_BIND").unwrap_or(defaults.bind_host),
            port: env_parse("PORT")
                .or_else(|| env_parse("PANEL_API_PORT"))
                .unwrap_or(defaults.port),
            service_name: std::env::var("PANEL_SERVICE_NAME").unwrap_or(defaults.service_name),
            cors_origins: std::env::var("PANEL_CORS_ORIGINS")
                .map(|s| parse_list(&s))
                .unwrap_or_default(),
            cors_max_age_secs: env_parse("PANEL_CORS_MAX_AGE_SECS")
                .unwrap_or(defaults.cors_max_age_secs),
        }
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        format!("{}:{}", self.bind_host, self.port)
            .parse()
            .map_err(|e| {
                ApiError::invalid_input(format!(
                    "Invalid bind address {}:{}: {}",
                    self.bind_host, self.port, e
                ))
            })
    }
}

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

/// Response cache configuration from environment variables.
///
/// - `PANEL_RESPONSE_CACHE_MAX`: Entry ceiling (default: 100)
/// - `PANEL_RESPONSE_CACHE_MARGIN`: Extra entries evicted per pass (default: 10)
///
/// The margin is clamped below the ceiling so an eviction pass always
/// leaves at least one entry.
pub fn cache_config_from_env() -> CacheConfig {
    let max: usize = env_parse("PANEL_RESPONSE_CACHE_MAX").unwrap_or(DEFAULT_RESPONSE_CACHE_MAX);
    let requested: usize =
        env_parse("PANEL_RESPONSE_CACHE_MARGIN").unwrap_or(DEFAULT_RESPONSE_CACHE_MARGIN);
    let margin = requested.min(max.saturating_sub(1));
    if margin != requested {
        tracing::warn!(
            max_entries = max,
            requested,
            margin,
            "Response cache margin clamped below the ceiling"
        );
    }
    CacheConfig::new()
        .with_max_entries(max)
        .with_eviction_margin(margin)
}

// ============================================================================
// DATA SOURCES
// ============================================================================

/// File-backed snapshots served by the table and chart endpoints.
#[derive(Debug, Clone, Default)]
pub struct DataSourceConfig {
    /// Table snapshots, exposed as `/api/table-data/<key>`.
    pub tables: BTreeMap<String, PathBuf>,

    /// Chart snapshots, exposed as `/api/chart-data/<key>`.
    pub charts: BTreeMap<String, PathBuf>,
}

impl DataSourceConfig {
    /// Load from `PANEL_DATA_FILES` and `PANEL_CHART_FILES`
    /// (`key=path,key=path`).
    pub fn from_env() -> Self {
        Self {
            tables: std::env::var("PANEL_DATA_FILES")
                .map(|s| parse_source_map(&s))
                .unwrap_or_default(),
            charts: std::env::var("PANEL_CHART_FILES")
                .map(|s| parse_source_map(&s))
                .unwrap_or_default(),
        }
    }

    /// Add a table snapshot.
    pub fn with_table(mut self, key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.tables.insert(key.into(), path.into());
        self
    }

    /// Add a chart snapshot.
    pub fn with_chart(mut self, key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.charts.insert(key.into(), path.into());
        self
    }
}

// ============================================================================
// AUTO UPDATE
// ============================================================================

/// Refresh coordinator settings. Mutable at runtime through the
/// auto-update routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoUpdateConfig {
    /// Whether the coordinator runs. The loop exits when this turns false.
    pub enabled: bool,

    /// Seconds between automatic updates.
    pub interval: u64,

    /// Component ids eligible for automatic refresh.
    pub components: Vec<String>,

    /// Pick components at random instead of round-robin.
    pub random_selection: bool,

    /// Subscriber ceiling; the oldest subscribers are evicted above it.
    pub max_clients: usize,

    /// Seconds an idle subscriber waits before receiving a heartbeat.
    pub heartbeat_interval: u64,
}

impl Default for AutoUpdateConfig {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_AUTO_UPDATE_ENABLED,
            interval: DEFAULT_AUTO_UPDATE_INTERVAL_SECS,
            components: DEFAULT_AUTO_UPDATE_COMPONENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            random_selection: DEFAULT_AUTO_UPDATE_RANDOM,
            max_clients: DEFAULT_MAX_CLIENTS,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL_SECS,
        }
    }
}

impl AutoUpdateConfig {
    /// Create AutoUpdateConfig from environment variables.
    ///
    /// Environment variables:
    /// - `PANEL_AUTO_UPDATE_ENABLED` (default: true)
    /// - `PANEL_AUTO_UPDATE_INTERVAL_SECS` (default: 30)
    /// - `PANEL_AUTO_UPDATE_COMPONENTS` (default: chart1,chart2,table1,table2)
    /// - `PANEL_AUTO_UPDATE_RANDOM` (default: true)
    /// - `PANEL_MAX_CLIENTS` (default: 50)
    /// - `PANEL_HEARTBEAT_INTERVAL_SECS` (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_flag("PANEL_AUTO_UPDATE_ENABLED", defaults.enabled),
            interval: env_parse::<u64>("PANEL_AUTO_UPDATE_INTERVAL_SECS")
                .filter(|v| *v > 0)
                .unwrap_or(defaults.interval),
            components: std::env::var("PANEL_AUTO_UPDATE_COMPONENTS")
                .map(|s| parse_list(&s))
                .unwrap_or(defaults.components),
            random_selection: env_flag("PANEL_AUTO_UPDATE_RANDOM", defaults.random_selection),
            max_clients: env_parse("PANEL_MAX_CLIENTS").unwrap_or(defaults.max_clients),
            heartbeat_interval: env_parse::<u64>("PANEL_HEARTBEAT_INTERVAL_SECS")
                .filter(|v| *v > 0)
                .unwrap_or(defaults.heartbeat_interval),
        }
    }

    /// Configuration used by tests and local development: disabled,
    /// one-second interval, round-robin selection.
    pub fn development() -> Self {
        Self {
            enabled: false,
            interval: 1,
            random_selection: false,
            ..Self::default()
        }
    }

    pub fn interval_duration(&self) -> Duration {
        Duration::from_secs(self.interval.max(1))
    }

    pub fn heartbeat_duration(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval.max(1))
    }

    /// Apply a validated partial update. Returns true when the update
    /// turned the coordinator on.
    pub fn apply(&mut self, patch: AutoUpdatePatch) -> ApiResult<bool> {
        patch.validate()?;
        let was_enabled = self.enabled;
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(interval) = patch.interval {
            self.interval = interval;
        }
        if let Some(components) = patch.components {
            self.components = components;
        }
        if let Some(random) = patch.random_selection {
            self.random_selection = random;
        }
        if let Some(max) = patch.max_clients {
            self.max_clients = max;
        }
        if let Some(heartbeat) = patch.heartbeat_interval {
            self.heartbeat_interval = heartbeat;
        }
        Ok(!was_enabled && self.enabled)
    }
}

/// Partial auto-update configuration accepted by `PUT /api/auto-update/config`.
/// Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoUpdatePatch {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub interval: Option<u64>,
    #[serde(default)]
    pub components: Option<Vec<String>>,
    #[serde(default)]
    pub random_selection: Option<bool>,
    #[serde(default)]
    pub max_clients: Option<usize>,
    #[serde(default)]
    pub heartbeat_interval: Option<u64>,
}

impl AutoUpdatePatch {
    fn validate(&self) -> ApiResult<()> {
        if self.interval == Some(0) {
            return Err(ApiError::invalid_input("interval must be at least 1 second"));
        }
        if self.heartbeat_interval == Some(0) {
            return Err(ApiError::invalid_input(
                "heartbeat_interval must be at least 1 second",
            ));
        }
        if self.max_clients == Some(0) {
            return Err(ApiError::invalid_input("max_clients must be at least 1"));
        }
        if let Some(components) = &self.components {
            if components.iter().any(|c| c.trim().is_empty()) {
                return Err(ApiError::invalid_input("component ids must not be empty"));
            }
        }
        Ok(())
    }
}

// ============================================================================
// APP CONFIGURATION
// ============================================================================

/// Everything the server needs at startup.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub sources: DataSourceConfig,
    pub auto_update: AutoUpdateConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            cache: cache_config_from_env(),
            sources: DataSourceConfig::from_env(),
            auto_update: AutoUpdateConfig::from_env(),
        }
    }

    /// Defaults with the coordinator disabled.
    pub fn development() -> Self {
        Self {
            auto_update: AutoUpdateConfig::development(),
            ..Self::default()
        }
    }
}
