//! Error types for Panel operations

use thiserror::Error;

/// Failures reading or decoding a backing source resource.
///
/// The data cache never propagates these to callers; they are logged and
/// turned into an empty artifact.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Source missing for {key}: {path}")]
    Missing { key: String, path: String },

    #[error("Failed to read source {key}: {reason}")]
    Io { key: String, reason: String },

    #[error("Failed to decode source {key}: {reason}")]
    Decode { key: String, reason: String },
}

/// Failures producing a canonical fingerprint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FingerprintError {
    #[error("Value is not serializable: {reason}")]
    NotSerializable { reason: String },
}

/// Handler registry errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown endpoint: {endpoint}")]
    UnknownEndpoint { endpoint: String },

    #[error("Endpoint already registered: {endpoint}")]
    DuplicateEndpoint { endpoint: String },
}

/// Errors raised by business handlers wrapped by the cache tiers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerError {
    #[error("Handler for {endpoint} failed: {reason}")]
    Failed { endpoint: String, reason: String },

    #[error("Invalid parameters: {reason}")]
    InvalidParams { reason: String },

    #[error("Source data unavailable: {key}")]
    SourceUnavailable { key: String },
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Failed`].
    pub fn failed(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }
}

/// Master error type for all Panel errors.
#[derive(Debug, Clone, Error)]
pub enum PanelError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Fingerprint error: {0}")]
    Fingerprint(#[from] FingerprintError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_error_display_missing() {
        let err = SourceError::Missing {
            key: "stocks".to_string(),
            path: "/data/stocks.json".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("stocks"));
        assert!(msg.contains("/data/stocks.json"));
    }

    #[test]
    fn test_registry_error_display_unknown() {
        let err = RegistryError::UnknownEndpoint {
            endpoint: "/api/table-data/nope".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Unknown endpoint: /api/table-data/nope"
        );
    }

    #[test]
    fn test_panel_error_from_handler() {
        let err: PanelError = HandlerError::failed("/api/chart-data/a", "boom").into();
        let msg = format!("{}", err);
        assert!(msg.starts_with("Handler error"));
        assert!(msg.contains("boom"));
    }
}
