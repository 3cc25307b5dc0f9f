//! Constants for Panel API
//!
//! This module contains all constant values used throughout the API.
//! Centralizing constants makes them easy to find, modify, and test.

// ============================================================================
// SERVER
// ============================================================================

/// Default bind host
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5004;

/// Default service name reported by health and status endpoints
pub const DEFAULT_SERVICE_NAME: &str = "panel-api";

/// Default deployment environment
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Service version reported by health and info endpoints
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// CORS
// ============================================================================

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// RESPONSE CACHE
// ============================================================================

/// Default response cache entry ceiling
pub const DEFAULT_RESPONSE_CACHE_MAX: usize = 100;

/// Default number of extra entries removed on each eviction pass
pub const DEFAULT_RESPONSE_CACHE_MARGIN: usize = 10;

// ============================================================================
// AUTO UPDATE
// ============================================================================

/// Whether the refresh coordinator runs by default
pub const DEFAULT_AUTO_UPDATE_ENABLED: bool = true;

/// Default seconds between automatic updates
pub const DEFAULT_AUTO_UPDATE_INTERVAL_SECS: u64 = 30;

/// Components refreshed automatically by default
pub const DEFAULT_AUTO_UPDATE_COMPONENTS: &[&str] = &["chart1", "chart2", "table1", "table2"];

/// Whether components are picked at random by default
pub const DEFAULT_AUTO_UPDATE_RANDOM: bool = true;

/// Default subscriber ceiling enforced by the refresh coordinator
pub const DEFAULT_MAX_CLIENTS: usize = 50;

/// Default seconds a subscriber waits before receiving a heartbeat
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;

// ============================================================================
// ROUTES
// ============================================================================

/// Prefix of table endpoints
pub const TABLE_DATA_PREFIX: &str = "/api/table-data/";

/// Prefix of chart endpoints
pub const CHART_DATA_PREFIX: &str = "/api/chart-data/";

/// Dashboard layout endpoint
pub const DASHBOARD_CONFIG_PATH: &str = "/api/dashboard-config";
