//! Cache key construction.
//!
//! A key is the endpoint identity, optionally followed by `:` and the
//! canonical JSON of the request parameters. Parameter maps that differ only
//! in insertion order produce the same key.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::fingerprint::canonical_string;

/// Request parameters as received from the route layer.
pub type Params = Map<String, Value>;

/// Separator between endpoint and canonical parameters.
const SEPARATOR: char = ':';

/// Key into the response cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for an endpoint invoked without parameters.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self(endpoint.into())
    }

    /// Key for an endpoint invoked with `params`.
    ///
    /// An empty parameter map yields the bare endpoint key.
    pub fn with_params(endpoint: &str, params: &Params) -> Self {
        if params.is_empty() {
            return Self::new(endpoint);
        }
        let canonical = canonical_string(&Value::Object(params.clone()));
        Self(format!("{}{}{}", endpoint, SEPARATOR, canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}
