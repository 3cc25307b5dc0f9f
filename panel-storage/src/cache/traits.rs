//! Source and stats types shared by the cache tiers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifies a cache tier, used for log fields and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    Data,
    Response,
    Startup,
}

impl CacheTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::Data => "data",
            CacheTier::Response => "response",
            CacheTier::Startup => "startup",
        }
    }
}

/// Statistics about the response cache.
///
/// Access times are seconds since the Unix epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseCacheStats {
    /// Number of cached payloads.
    pub cache_size: usize,
    /// Number of entries carrying a fingerprint.
    pub hash_cache_size: usize,
    /// Configured entry ceiling.
    pub max_cache_size: usize,
    /// Least recent access, if any entry exists.
    pub oldest_access: Option<f64>,
    /// Most recent access, if any entry exists.
    pub newest_access: Option<f64>,
}

/// Statistics about the data cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataCacheStats {
    /// Number of cached artifacts.
    pub data_cache_size: usize,
    /// Number of recorded source timestamps.
    pub data_timestamps: usize,
    /// Number of registered backing sources.
    pub registered_sources: usize,
}

/// Statistics about the startup-once cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartupCacheStats {
    /// Number of endpoints computed so far.
    pub cached_endpoints: usize,
    /// When the cache was created (seconds since the Unix epoch).
    pub startup_time: f64,
    /// Seconds elapsed since the cache was created.
    pub cache_age_seconds: f64,
    /// Namespaced keys of every cached endpoint, sorted.
    pub cache_keys: Vec<String>,
}

/// Snapshot of `key -> source mtime` (seconds since the Unix epoch).
pub type SourceTimestamps = BTreeMap<String, f64>;
