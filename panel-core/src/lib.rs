//! Panel Core - Shared Types
//!
//! Keys, fingerprints, timestamps and the error taxonomy used by every
//! cache tier. This crate contains no cache state of its own.

pub mod error;
pub mod fingerprint;
pub mod key;

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use error::{
    FingerprintError, HandlerError, PanelError, RegistryError, SourceError,
};
pub use fingerprint::{
    canonical_json, canonical_string, canonicalize, fingerprint, try_fingerprint, Fingerprint,
};
pub use key::{CacheKey, Params};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Identifier of a live subscriber connection (UUIDv7, sortable by creation).
pub type SubscriberId = Uuid;

/// Generate a new subscriber identifier.
pub fn new_subscriber_id() -> SubscriberId {
    Uuid::now_v7()
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Seconds since the Unix epoch as a float, matching the wire format of the
/// cache status endpoint.
pub fn unix_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
