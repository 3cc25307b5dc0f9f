//! Response cache: computed payloads revalidated by content fingerprint.
//!
//! An entry is reused when the caller's current source summary hashes to the
//! fingerprint recorded at store time, or when the caller supplies no
//! summary at all. When the entry count exceeds the ceiling, the least
//! recently accessed entries are evicted down to `max_entries - eviction_margin`.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::SystemTime;

use panel_core::{fingerprint, unix_seconds, CacheKey, Fingerprint};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::traits::ResponseCacheStats;
use super::{read_guard, write_guard};

/// Configuration for the response cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Entry ceiling; eviction runs when the count exceeds it.
    pub max_entries: usize,
    /// Extra entries removed on each eviction pass.
    pub eviction_margin: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            eviction_margin: 10,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry ceiling.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Set the eviction margin.
    pub fn with_eviction_margin(mut self, margin: usize) -> Self {
        self.eviction_margin = margin;
        self
    }
}

#[derive(Debug, Clone)]
struct Entry<P> {
    payload: P,
    fingerprint: Option<Fingerprint>,
    last_accessed: SystemTime,
    /// Monotonic access order; wall-clock time can tie or go backwards.
    access_seq: u64,
}

#[derive(Debug)]
struct Inner<P> {
    entries: HashMap<CacheKey, Entry<P>>,
    next_seq: u64,
}

impl<P> Inner<P> {
    fn touch(&mut self, key: &CacheKey) {
        let seq = self.next_seq;
        if let Some(entry) = self.entries.get_mut(key) {
            entry.access_seq = seq;
            entry.last_accessed = SystemTime::now();
            self.next_seq += 1;
        }
    }
}

/// Bounded map from [`CacheKey`] to computed payloads.
#[derive(Debug)]
pub struct ResponseCache<P = Value> {
    config: CacheConfig,
    inner: RwLock<Inner<P>>,
}

impl<P: Clone> Default for ResponseCache<P> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<P: Clone> ResponseCache<P> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                next_seq: 0,
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the cached payload for `key` if it may be reused.
    ///
    /// With no `summary` any existing entry is reused. Otherwise the entry
    /// is reused only if the summary's fingerprint matches the stored one.
    /// A hit refreshes the entry's access time.
    pub fn should_use_cache<S>(&self, key: &CacheKey, summary: Option<&S>) -> Option<P>
    where
        S: Serialize + ?Sized,
    {
        let current = summary.map(fingerprint);

        let mut inner = write_guard(&self.inner);
        let entry = inner.entries.get(key)?;
        let reusable = match &current {
            None => true,
            Some(fp) => entry.fingerprint.as_ref() == Some(fp),
        };
        if !reusable {
            debug!(key = %key, "Response cache stale");
            return None;
        }

        let payload = entry.payload.clone();
        inner.touch(key);
        debug!(key = %key, "Response cache hit");
        Some(payload)
    }

    /// Store `payload` under `key`, then evict if over the ceiling.
    ///
    /// A `summary` replaces the stored fingerprint; without one the previous
    /// fingerprint (if any) is kept. Returns the number of entries evicted.
    pub fn store<S>(&self, key: CacheKey, summary: Option<&S>, payload: P) -> usize
    where
        S: Serialize + ?Sized,
    {
        let new_fp = summary.map(fingerprint);

        let mut inner = write_guard(&self.inner);
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let previous_fp = inner.entries.remove(&key).and_then(|e| e.fingerprint);
        inner.entries.insert(
            key.clone(),
            Entry {
                payload,
                fingerprint: new_fp.or(previous_fp),
                last_accessed: SystemTime::now(),
                access_seq: seq,
            },
        );

        self.evict(&mut inner, &key)
    }

    /// Evict the least recently accessed entries. `keep` (the entry just
    /// stored) always survives, whatever the margin.
    fn evict(&self, inner: &mut Inner<P>, keep: &CacheKey) -> usize {
        let len = inner.entries.len();
        if len <= self.config.max_entries {
            return 0;
        }

        let to_remove =
            (len - self.config.max_entries + self.config.eviction_margin).min(len - 1);
        let mut by_age: Vec<(u64, CacheKey)> = inner
            .entries
            .iter()
            .filter(|(key, _)| *key != keep)
            .map(|(key, entry)| (entry.access_seq, key.clone()))
            .collect();
        by_age.sort_unstable_by_key(|(seq, _)| *seq);

        for (_, key) in by_age.into_iter().take(to_remove) {
            inner.entries.remove(&key);
        }

        info!(
            removed = to_remove,
            remaining = inner.entries.len(),
            "Evicted response cache entries"
        );
        to_remove
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        read_guard(&self.inner).entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        read_guard(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry. Returns the number removed.
    pub fn clear(&self) -> usize {
        let mut inner = write_guard(&self.inner);
        let removed = inner.entries.len();
        inner.entries.clear();
        info!(removed, "Cleared response cache");
        removed
    }

    pub fn stats(&self) -> ResponseCacheStats {
        let inner = read_guard(&self.inner);
        let accesses = inner.entries.values().map(|e| unix_seconds(e.last_accessed));
        let (oldest, newest) = accesses.fold((None, None), |(lo, hi): (Option<f64>, Option<f64>), t| {
            (
                Some(lo.map_or(t, |v| v.min(t))),
                Some(hi.map_or(t, |v| v.max(t))),
            )
        });

        ResponseCacheStats {
            cache_size: inner.entries.len(),
            hash_cache_size: inner
                .entries
                .values()
                .filter(|e| e.fingerprint.is_some())
                .count(),
            max_cache_size: self.config.max_entries,
            oldest_access: oldest,
            newest_access: newest,
        }
    }
}
