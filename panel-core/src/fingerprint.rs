//! Canonical serialization and content fingerprints.
//!
//! A fingerprint is a SHA-256 digest over the canonical JSON form of a
//! caller-supplied summary. Object keys are sorted recursively before
//! hashing, so two summaries that differ only in field order hash the same.
//!
//! # Failure policy
//!
//! [`fingerprint`] fails open to no-cache: if the summary cannot be
//! serialized, a unique time-based nonce is returned instead. A nonce never
//! matches a stored fingerprint, so the caller recomputes for that one call.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::FingerprintError;

/// Prefix marking a fallback nonce rather than a content digest.
const NONCE_PREFIX: &str = "nonce:";

static NONCE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Content fingerprint of a source summary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Borrow the fingerprint as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this is a fallback nonce rather than a digest.
    pub fn is_nonce(&self) -> bool {
        self.0.starts_with(NONCE_PREFIX)
    }

    fn nonce() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let seq = NONCE_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("{}{}-{}", NONCE_PREFIX, nanos, seq))
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Recursively rebuild a JSON value with every object's keys in sorted order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key.as_str()]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Canonical compact JSON text for an already-built JSON value.
pub fn canonical_string(value: &Value) -> String {
    canonicalize(value).to_string()
}

/// Canonical compact JSON text for any serializable value.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String, FingerprintError> {
    let value = serde_json::to_value(value).map_err(|e| FingerprintError::NotSerializable {
        reason: e.to_string(),
    })?;
    Ok(canonical_string(&value))
}

/// Fingerprint a value, reporting serialization failures.
pub fn try_fingerprint<T: Serialize + ?Sized>(value: &T) -> Result<Fingerprint, FingerprintError> {
    let canonical = canonical_json(value)?;
    Ok(Fingerprint(hex::encode(Sha256::digest(canonical.as_bytes()))))
}

/// Fingerprint a value, falling back to a unique nonce if it cannot be
/// serialized.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> Fingerprint {
    match try_fingerprint(value) {
        Ok(fp) => fp,
        Err(e) => {
            let nonce = Fingerprint::nonce();
            tracing::warn!(error = %e, nonce = %nonce, "Fingerprint failed, caching disabled for this call");
            nonce
        }
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: reversing insertion order never changes the fingerprint.
        #[test]
        fn prop_fingerprint_independent_of_insertion_order(
            entries in prop::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..12)
        ) {
            let mut forward = Map::new();
            for (k, v) in entries.iter() {
                forward.insert(k.clone(), Value::from(*v));
            }
            let mut backward = Map::new();
            for (k, v) in entries.iter().rev() {
                backward.insert(k.clone(), Value::from(*v));
            }
            prop_assert_eq!(
                fingerprint(&Value::Object(forward)),
                fingerprint(&Value::Object(backward))
            );
        }
    }
}
