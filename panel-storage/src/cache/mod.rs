//! Cache tiers with explicit staleness oracles.
//!
//! Every tier answers "can I reuse this?" with a different oracle:
//!
//! | Tier | Oracle | Miss behaviour |
//! |---|---|---|
//! | [`DataCache`] | source mtime equality | reload from the source, or empty artifact |
//! | [`ResponseCache`] | fingerprint equality | caller recomputes and stores |
//! | [`StartupCache`] | presence only | caller computes once and stores |
//!
//! Cache-tier failures are never surfaced as errors. An unreadable source
//! degrades to an empty artifact, an unserializable summary degrades to a
//! cache miss, and a poisoned lock is recovered and keeps serving.
//!
//! # Example
//!
//! ```ignore
//! let responses = ResponseCache::new(CacheConfig::default());
//! let key = CacheKey::new("chart:A");
//!
//! if let Some(payload) = responses.should_use_cache(&key, Some(&summary)) {
//!     return payload;
//! }
//! let payload = compute();
//! responses.store(key, Some(&summary), payload.clone());
//! ```

pub mod data_cache;
pub mod response_cache;
pub mod source;
pub mod startup_cache;
pub mod traits;

pub use data_cache::DataCache;
pub use response_cache::{CacheConfig, ResponseCache};
pub use source::{FileSource, JsonDecoder, SourceDecoder, SourceWatcher};
pub use startup_cache::StartupCache;
pub use traits::{
    CacheTier, DataCacheStats, ResponseCacheStats, SourceTimestamps, StartupCacheStats,
};

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Acquire a read guard, recovering the data if a writer panicked.
pub(crate) fn read_guard<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

/// Acquire a write guard, recovering the data if a writer panicked.
pub(crate) fn write_guard<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
