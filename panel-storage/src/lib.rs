//! Panel Storage - Cache Tiers
//!
//! The three cache tiers used by dashboard handlers:
//!
//! - [`DataCache`]: deserialized source artifacts revalidated by mtime
//! - [`ResponseCache`]: computed payloads revalidated by content fingerprint
//! - [`StartupCache`]: payloads computed at most once per process
//!
//! Each tier owns its own lock. Tiers never call into each other.

pub mod cache;

pub use cache::{
    CacheConfig, CacheTier, DataCache, DataCacheStats, FileSource, JsonDecoder,
    ResponseCache, ResponseCacheStats, SourceDecoder, SourceWatcher, StartupCache,
    StartupCacheStats,
};
