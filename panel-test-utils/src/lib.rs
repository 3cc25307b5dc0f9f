//! Panel Test Utilities
//!
//! Shared test infrastructure for the Panel workspace:
//! - Proptest generators for request parameters and source summaries
//! - A counting source spy for data cache reload assertions
//! - Temporary snapshot files with controllable mtimes

pub use panel_core::{CacheKey, Params};
pub use panel_storage::SourceWatcher;

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use proptest::prelude::*;
use serde_json::{Map, Value};
use tempfile::TempDir;

// ============================================================================
// GENERATORS
// ============================================================================

/// Generate a JSON scalar.
pub fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 _-]{0,12}".prop_map(Value::String),
    ]
}

/// Generate a nested JSON value of bounded depth.
pub fn arb_json() -> impl Strategy<Value = Value> {
    arb_scalar().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Generate request parameters as `(key, value)` pairs in arbitrary order.
///
/// Keys are unique so the pairs can be inserted in any order and still
/// describe the same parameter set.
pub fn arb_param_pairs() -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::btree_map("[a-z_]{1,8}", arb_scalar(), 0..6)
        .prop_map(|m| m.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

/// Generate a parameter map.
pub fn arb_params() -> impl Strategy<Value = Params> {
    arb_param_pairs().prop_map(|pairs| pairs.into_iter().collect())
}

/// Generate an endpoint path.
pub fn arb_endpoint() -> impl Strategy<Value = String> {
    ("(table|chart)", "[a-z0-9]{1,8}").prop_map(|(kind, name)| format!("/api/{}-data/{}", kind, name))
}

/// Build a parameter map from pairs, inserting in the given order.
pub fn params_from(pairs: &[(String, Value)]) -> Params {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert(k.clone(), v.clone());
    }
    map
}

// ============================================================================
// SOURCE SPY
// ============================================================================

#[derive(Debug)]
struct SpyState {
    mtime: Option<SystemTime>,
    content: Vec<u8>,
}

/// In-memory data source that counts reads and lets tests move its mtime.
#[derive(Debug)]
pub struct CountingSource {
    state: Mutex<SpyState>,
    reads: AtomicUsize,
}

impl CountingSource {
    /// Source with the given mtime (seconds since the epoch) and JSON content.
    pub fn new(mtime_secs: u64, content: &Value) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SpyState {
                mtime: Some(UNIX_EPOCH + Duration::from_secs(mtime_secs)),
                content: content.to_string().into_bytes(),
            }),
            reads: AtomicUsize::new(0),
        })
    }

    /// Replace the content and move the mtime.
    pub fn modify(&self, mtime_secs: u64, content: &Value) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.mtime = Some(UNIX_EPOCH + Duration::from_secs(mtime_secs));
        state.content = content.to_string().into_bytes();
    }

    /// Make the source disappear.
    pub fn remove(&self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .mtime = None;
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl SourceWatcher for CountingSource {
    fn location(&self) -> String {
        "memory://counting-source".to_string()
    }

    fn modified(&self) -> Option<SystemTime> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .mtime
    }

    fn read(&self) -> io::Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.mtime {
            Some(_) => Ok(state.content.clone()),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "source removed")),
        }
    }
}

// ============================================================================
// SNAPSHOT FIXTURES
// ============================================================================

/// A temporary directory of JSON snapshot files.
#[derive(Debug)]
pub struct SnapshotDir {
    dir: TempDir,
}

impl SnapshotDir {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `value` to `<name>.json` and return its path.
    pub fn write(&self, name: &str, value: &Value) -> io::Result<PathBuf> {
        let path = self.dir.path().join(format!("{}.json", name));
        std::fs::write(&path, value.to_string())?;
        Ok(path)
    }

    /// Rewrite `<name>.json` and push its mtime `secs_ahead` into the future
    /// so the change is visible regardless of filesystem timestamp resolution.
    pub fn rewrite(&self, name: &str, value: &Value, secs_ahead: u64) -> io::Result<PathBuf> {
        let path = self.write(name, value)?;
        set_mtime(&path, SystemTime::now() + Duration::from_secs(secs_ahead))?;
        Ok(path)
    }
}

/// Set a file's modification time.
pub fn set_mtime(path: &Path, time: SystemTime) -> io::Result<()> {
    File::options().write(true).open(path)?.set_modified(time)
}

// ============================================================================
// SAMPLE DATA
// ============================================================================

/// A small table snapshot as an array of row objects.
pub fn sample_rows() -> Value {
    serde_json::json!([
        {"code": "600519", "name": "Alpha", "price": 1700.5},
        {"code": "000001", "name": "Beta", "price": 11.2},
        {"code": "300750", "name": "Gamma", "price": 190.0}
    ])
}
