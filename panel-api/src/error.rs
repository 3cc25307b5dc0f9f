//! Error Types for Panel API
//!
//! Every failure that reaches a client is an [`ApiError`]: a code that picks
//! the HTTP status, a message, and optional JSON details. Errors from the
//! core crates convert into it with `?`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use panel_core::{HandlerError, PanelError, RegistryError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Category of an API failure, serialized as `SCREAMING_SNAKE_CASE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Malformed body, bad query parameter or rejected config patch
    InvalidInput,

    /// A required body field was absent or blank
    MissingField,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// No handler is registered for the requested endpoint
    UnknownEndpoint,

    // ========================================================================
    // Conflict Errors (409)
    // ========================================================================
    /// Endpoint registered twice
    DuplicateEndpoint,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// A dashboard handler failed while computing its payload
    HandlerFailed,

    /// A snapshot the handler needs could not be read
    SourceUnavailable,

    /// Anything else
    InternalError,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput | ErrorCode::MissingField => StatusCode::BAD_REQUEST,

            ErrorCode::UnknownEndpoint => StatusCode::NOT_FOUND,

            ErrorCode::DuplicateEndpoint => StatusCode::CONFLICT,

            ErrorCode::SourceUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::HandlerFailed | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// JSON error body returned by every failing route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,

    pub message: String,

    /// Extra context, e.g. the endpoint whose handler failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Shorthands
    // ========================================================================

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(ErrorCode::MissingField, format!("`{}` is required", field))
            .with_details(serde_json::json!({ "field": field }))
    }

    pub fn unknown_endpoint(endpoint: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::UnknownEndpoint,
            format!("Unknown endpoint: {}", endpoint),
        )
    }

    /// Handler failure, with the endpoint recorded in `details`.
    pub fn handler_failed(endpoint: &str, reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::HandlerFailed, reason).with_details(serde_json::json!({
            "endpoint": endpoint,
        }))
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<HandlerError> for ApiError {
    fn from(err: HandlerError) -> Self {
        match &err {
            HandlerError::Failed { endpoint, reason } => {
                tracing::error!(endpoint = %endpoint, reason = %reason, "Handler failed");
                ApiError::handler_failed(endpoint, reason.clone())
            }
            HandlerError::InvalidParams { reason } => ApiError::invalid_input(reason.clone()),
            HandlerError::SourceUnavailable { key } => {
                tracing::warn!(key = %key, "Handler source unavailable");
                ApiError::new(ErrorCode::SourceUnavailable, err.to_string())
            }
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownEndpoint { endpoint } => ApiError::unknown_endpoint(endpoint),
            RegistryError::DuplicateEndpoint { endpoint } => ApiError::new(
                ErrorCode::DuplicateEndpoint,
                format!("Endpoint already registered: {}", endpoint),
            ),
        }
    }
}

impl From<PanelError> for ApiError {
    fn from(err: PanelError) -> Self {
        match err {
            PanelError::Handler(e) => e.into(),
            PanelError::Registry(e) => e.into(),
            other => {
                tracing::error!(error = %other, "Panel error");
                ApiError::internal_error(other.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::warn!(error = %err, "Rejected JSON payload");
        ApiError::invalid_input(format!("Malformed JSON: {}", err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_input(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ErrorCode::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::UnknownEndpoint.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::HandlerFailed.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::SourceUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_error_code_serialization() -> Result<(), serde_json::Error> {
        assert_eq!(
            serde_json::to_string(&ErrorCode::HandlerFailed)?,
            "\"HANDLER_FAILED\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorCode::UnknownEndpoint)?,
            "\"UNKNOWN_ENDPOINT\""
        );
        Ok(())
    }

    #[test]
    fn test_handler_error_conversion() {
        let err: ApiError = HandlerError::failed("/api/chart-data/x", "boom").into();
        assert_eq!(err.code, ErrorCode::HandlerFailed);
        assert_eq!(err.message, "boom");
        assert_eq!(
            err.details,
            Some(serde_json::json!({"endpoint": "/api/chart-data/x"}))
        );

        let err: ApiError = HandlerError::InvalidParams {
            reason: "bad range".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_registry_error_conversion() {
        let err: ApiError = RegistryError::UnknownEndpoint {
            endpoint: "/nope".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.message.contains("/nope"));

        let err: ApiError = PanelError::from(RegistryError::DuplicateEndpoint {
            endpoint: "/a".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::DuplicateEndpoint);
    }

    #[test]
    fn test_error_body_omits_empty_details() -> Result<(), serde_json::Error> {
        let json = serde_json::to_value(ApiError::internal_error("disk on fire"))?;
        assert_eq!(json["code"], "INTERNAL_ERROR");
        assert_eq!(json["message"], "disk on fire");
        assert!(json.get("details").is_none());

        let json = serde_json::to_value(ApiError::missing_field("componentId"))?;
        assert_eq!(json["details"]["field"], "componentId");
        Ok(())
    }
}
