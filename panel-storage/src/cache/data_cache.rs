//! Data cache: deserialized source artifacts revalidated by mtime.
//!
//! A cached artifact is reused while its source's current modification time
//! equals the one recorded when it was loaded. Any difference (forward or
//! backward) triggers a reload. A missing or unreadable source yields the
//! decoder's empty artifact and leaves any previous entry in place.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use panel_core::{unix_seconds, SourceError};
use tracing::{debug, info, warn};

use super::source::{FileSource, JsonDecoder, SourceDecoder, SourceWatcher};
use super::traits::{DataCacheStats, SourceTimestamps};
use super::{read_guard, write_guard};

/// How an entry got into the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Loaded from the registered source; stamp is the source mtime.
    Source,
    /// Injected through [`DataCache::update`]; stamp is the injection time.
    Injected,
}

/// A cached artifact and the stamp it was validated against.
#[derive(Debug, Clone)]
struct Entry<T> {
    content: T,
    source_mtime: SystemTime,
    origin: Origin,
}

impl<T> Entry<T> {
    /// Whether the entry must be reloaded given the source's current mtime.
    ///
    /// Injected entries survive until the source is modified after the
    /// injection.
    fn is_stale(&self, current: SystemTime) -> bool {
        match self.origin {
            Origin::Source => current != self.source_mtime,
            Origin::Injected => current > self.source_mtime,
        }
    }
}

#[derive(Debug)]
struct Inner<T> {
    sources: HashMap<String, Arc<dyn SourceWatcher>>,
    entries: HashMap<String, Entry<T>>,
}

/// Result of revalidating a single key.
enum Revalidation<T> {
    Fresh(T),
    Reloaded(T),
    Unavailable,
}

/// Cache of decoded source artifacts keyed by logical name.
pub struct DataCache<D: SourceDecoder = JsonDecoder> {
    decoder: D,
    inner: RwLock<Inner<D::Output>>,
}

impl Default for DataCache<JsonDecoder> {
    fn default() -> Self {
        Self::new()
    }
}

impl DataCache<JsonDecoder> {
    /// Create an empty cache decoding JSON snapshots.
    pub fn new() -> Self {
        Self::with_decoder(JsonDecoder)
    }
}

impl<D: SourceDecoder> DataCache<D> {
    /// Create an empty cache with a custom decoder.
    pub fn with_decoder(decoder: D) -> Self {
        Self {
            decoder,
            inner: RwLock::new(Inner {
                sources: HashMap::new(),
                entries: HashMap::new(),
            }),
        }
    }

    /// Register (or replace) the backing source for `key`.
    pub fn register_source(&self, key: impl Into<String>, source: Arc<dyn SourceWatcher>) {
        let key = key.into();
        debug!(key = %key, location = %source.location(), "Registering data source");
        write_guard(&self.inner).sources.insert(key, source);
    }

    /// Register a file path as the backing source for `key`.
    pub fn add_source(&self, key: impl Into<String>, path: impl Into<PathBuf>) {
        self.register_source(key, Arc::new(FileSource::new(path)));
    }

    /// Register several file sources at once.
    pub fn update_sources<I, K, P>(&self, sources: I)
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: Into<PathBuf>,
    {
        for (key, path) in sources {
            self.add_source(key, path);
        }
    }

    /// Whether a backing source is registered for `key`.
    pub fn has_source(&self, key: &str) -> bool {
        read_guard(&self.inner).sources.contains_key(key)
    }

    /// Current mtime of the source behind `key`, without loading it.
    pub fn source_modified(&self, key: &str) -> Option<SystemTime> {
        let source = read_guard(&self.inner).sources.get(key).cloned()?;
        source.modified()
    }

    /// Registered keys, sorted.
    pub fn source_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = read_guard(&self.inner).sources.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Return the artifact for `key`, reloading it if its source changed.
    ///
    /// Never fails: an unregistered key with no injected content, a missing
    /// source, or an unreadable source all yield the empty artifact.
    pub fn load(&self, key: &str) -> D::Output {
        match self.revalidate(key) {
            Revalidation::Fresh(content) | Revalidation::Reloaded(content) => content,
            Revalidation::Unavailable => D::Output::default(),
        }
    }

    /// Inject `content` for `key`, stamped with the current time.
    pub fn update(&self, key: impl Into<String>, content: D::Output) {
        let key = key.into();
        debug!(key = %key, "Injecting data cache entry");
        write_guard(&self.inner).entries.insert(
            key,
            Entry {
                content,
                source_mtime: SystemTime::now(),
                origin: Origin::Injected,
            },
        );
    }

    /// Whether an artifact is currently cached for `key`.
    pub fn contains(&self, key: &str) -> bool {
        read_guard(&self.inner).entries.contains_key(key)
    }

    /// Reload every cached entry whose source changed. Returns the number of
    /// entries reloaded.
    pub fn revalidate_all(&self) -> usize {
        let keys: Vec<String> = {
            let inner = read_guard(&self.inner);
            inner
                .entries
                .keys()
                .filter(|key| inner.sources.contains_key(*key))
                .cloned()
                .collect()
        };

        let reloaded = keys
            .iter()
            .filter(|key| matches!(self.revalidate(key), Revalidation::Reloaded(_)))
            .count();

        if reloaded > 0 {
            info!(reloaded, "Revalidated data cache");
        }
        reloaded
    }

    /// Drop every cached artifact. Registered sources are kept.
    pub fn clear(&self) -> usize {
        let mut inner = write_guard(&self.inner);
        let removed = inner.entries.len();
        inner.entries.clear();
        info!(removed, "Cleared data cache");
        removed
    }

    /// Recorded stamp of every cached entry.
    pub fn timestamps(&self) -> SourceTimestamps {
        read_guard(&self.inner)
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), unix_seconds(entry.source_mtime)))
            .collect()
    }

    pub fn stats(&self) -> DataCacheStats {
        let inner = read_guard(&self.inner);
        DataCacheStats {
            data_cache_size: inner.entries.len(),
            data_timestamps: inner.entries.len(),
            registered_sources: inner.sources.len(),
        }
    }

    fn revalidate(&self, key: &str) -> Revalidation<D::Output> {
        let source = {
            let inner = read_guard(&self.inner);
            match inner.sources.get(key) {
                Some(source) => Arc::clone(source),
                None => {
                    return match inner.entries.get(key) {
                        Some(entry) => Revalidation::Fresh(entry.content.clone()),
                        None => Revalidation::Unavailable,
                    };
                }
            }
        };

        let Some(current) = source.modified() else {
            let error = SourceError::Missing {
                key: key.to_string(),
                path: source.location(),
            };
            warn!(error = %error, "Data source unavailable");
            return Revalidation::Unavailable;
        };

        let seen_stamp = match read_guard(&self.inner).entries.get(key) {
            Some(entry) if !entry.is_stale(current) => {
                debug!(key = %key, "Using cached data");
                return Revalidation::Fresh(entry.content.clone());
            }
            Some(entry) => Some(entry.source_mtime),
            None => None,
        };

        // Read and decode outside the lock.
        match self.read_source(key, source.as_ref()) {
            Ok(content) => {
                let mut inner = write_guard(&self.inner);
                if let Some(existing) = inner.entries.get(key) {
                    // Another load or injection landed while we were reading.
                    let replaced = Some(existing.source_mtime) != seen_stamp;
                    if replaced && existing.source_mtime >= current {
                        debug!(key = %key, "Newer entry stored during reload, keeping it");
                        return Revalidation::Fresh(existing.content.clone());
                    }
                }
                inner.entries.insert(
                    key.to_string(),
                    Entry {
                        content: content.clone(),
                        source_mtime: current,
                        origin: Origin::Source,
                    },
                );
                drop(inner);

                info!(key = %key, location = %source.location(), "Loaded data source");
                Revalidation::Reloaded(content)
            }
            Err(error) => {
                warn!(error = %error, "Failed to load data source");
                Revalidation::Unavailable
            }
        }
    }

    fn read_source(&self, key: &str, source: &dyn SourceWatcher) -> Result<D::Output, SourceError> {
        let bytes = source.read().map_err(|e| SourceError::Io {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.decoder.decode(&bytes).map_err(|reason| SourceError::Decode {
            key: key.to_string(),
            reason,
        })
    }
}

impl<D: SourceDecoder> std::fmt::Debug for DataCache<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("DataCache")
            .field("entries", &stats.data_cache_size)
            .field("sources", &stats.registered_sources)
            .finish()
    }
}
