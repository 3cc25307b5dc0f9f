//! Backing resources and decoders for the data cache.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde_json::Value;

/// A named backing resource whose modification time acts as the staleness
/// oracle for the data cache.
pub trait SourceWatcher: Send + Sync + fmt::Debug {
    /// Human-readable location used in logs.
    fn location(&self) -> String;

    /// Current modification time, or `None` if the resource is missing.
    fn modified(&self) -> Option<SystemTime>;

    /// Read the raw content of the resource.
    fn read(&self) -> std::io::Result<Vec<u8>>;
}

/// A file on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SourceWatcher for FileSource {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn modified(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok()
    }

    fn read(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }
}

/// Turns raw source bytes into the artifact held by the data cache.
///
/// `Output::default()` is the empty artifact returned when a source is
/// unavailable.
pub trait SourceDecoder: Send + Sync {
    type Output: Clone + Default + Send + Sync;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Output, String>;
}

/// Decodes JSON snapshots. The empty artifact is `Value::Null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl SourceDecoder for JsonDecoder {
    type Output = Value;

    fn decode(&self, bytes: &[u8]) -> Result<Value, String> {
        serde_json::from_slice(bytes).map_err(|e| e.to_string())
    }
}
