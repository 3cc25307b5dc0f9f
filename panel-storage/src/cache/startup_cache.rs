//! Startup-once cache: payloads computed at most once per process.
//!
//! Entries are never revalidated. They live until [`StartupCache::clear`]
//! or process exit.

use std::time::SystemTime;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use panel_core::unix_seconds;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::traits::StartupCacheStats;

/// Namespace prefix applied to every endpoint key.
const KEY_PREFIX: &str = "startup:";

/// Cache type reported in the payload metadata annotation.
const CACHE_TYPE: &str = "startup_once";

/// Process-lifetime cache keyed by endpoint identity.
#[derive(Debug)]
pub struct StartupCache {
    entries: DashMap<String, Value>,
    started_at: SystemTime,
}

impl Default for StartupCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StartupCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            started_at: SystemTime::now(),
        }
    }

    fn key(endpoint: &str) -> String {
        format!("{}{}", KEY_PREFIX, endpoint)
    }

    pub fn is_cached(&self, endpoint: &str) -> bool {
        self.entries.contains_key(&Self::key(endpoint))
    }

    /// Return the cached payload for `endpoint`.
    ///
    /// Object payloads carrying a `metadata` object get it annotated with
    /// `cached`, `cache_type` and `cached_at`.
    pub fn get(&self, endpoint: &str) -> Option<Value> {
        let mut payload = self.entries.get(&Self::key(endpoint))?.value().clone();
        if let Some(Value::Object(meta)) = payload.get_mut("metadata") {
            meta.insert("cached".to_string(), json!(true));
            meta.insert("cache_type".to_string(), json!(CACHE_TYPE));
            meta.insert("cached_at".to_string(), json!(unix_seconds(self.started_at)));
        }
        debug!(endpoint = %endpoint, "Startup cache hit");
        Some(payload)
    }

    /// Store `payload` for `endpoint` unless one is already stored.
    ///
    /// Returns true if this call wrote the entry. Concurrent first callers
    /// may all compute, but exactly one value is kept.
    pub fn set(&self, endpoint: &str, payload: Value) -> bool {
        match self.entries.entry(Self::key(endpoint)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(payload);
                info!(endpoint = %endpoint, "Cached startup payload");
                true
            }
        }
    }

    /// Remove every entry. Returns the number removed.
    pub fn clear(&self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        info!(removed, "Cleared startup cache");
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> StartupCacheStats {
        let mut cache_keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        cache_keys.sort();
        let age = SystemTime::now()
            .duration_since(self.started_at)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        StartupCacheStats {
            cached_endpoints: cache_keys.len(),
            startup_time: unix_seconds(self.started_at),
            cache_age_seconds: age,
            cache_keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_set_once() {
        let cache = StartupCache::new();
        assert!(!cache.is_cached("/api/chart-data/chart1"));
        assert!(cache.set("/api/chart-data/chart1", json!({"v": 1})));
        assert!(!cache.set("/api/chart-data/chart1", json!({"v": 2})));

        let payload = cache.get("/api/chart-data/chart1").unwrap();
        assert_eq!(payload["v"], 1);
    }

    #[test]
    fn test_get_annotates_metadata() {
        let cache = StartupCache::new();
        cache.set("e", json!({"data": [], "metadata": {"source": "x"}}));

        let payload = cache.get("e").unwrap();
        assert_eq!(payload["metadata"]["source"], "x");
        assert_eq!(payload["metadata"]["cached"], true);
        assert_eq!(payload["metadata"]["cache_type"], "startup_once");
        assert!(payload["metadata"]["cached_at"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn test_payload_without_metadata_is_returned_as_is() {
        let cache = StartupCache::new();
        cache.set("list", json!([1, 2]));
        cache.set("plain", json!({"data": 1}));
        assert_eq!(cache.get("list"), Some(json!([1, 2])));
        assert_eq!(cache.get("plain"), Some(json!({"data": 1})));
    }

    #[test]
    fn test_clear_and_stats() {
        let cache = StartupCache::new();
        cache.set("b", json!(1));
        cache.set("a", json!(2));

        let stats = cache.stats();
        assert_eq!(stats.cached_endpoints, 2);
        assert_eq!(stats.cache_keys, vec!["startup:a", "startup:b"]);
        assert!(stats.cache_age_seconds >= 0.0);

        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn test_concurrent_first_set_keeps_one_value() {
        let cache = Arc::new(StartupCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.set("e", json!(i)))
            })
            .collect();
        let writers = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|wrote| *wrote)
            .count();

        assert_eq!(writers, 1);
        assert_eq!(cache.len(), 1);
    }
}
