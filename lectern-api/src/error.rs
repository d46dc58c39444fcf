//! Error types for the Lectern API
//!
//! Every failure a handler can produce is an [`ApiError`]: a stable
//! machine-readable [`ErrorCode`], a human-readable message and optional
//! structured details. The code decides the HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lectern_core::{ConfigError, LecternError, LlmError, StorageError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ============================================================================
// ERROR CODES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Authentication
    // ========================================================================
    /// No credential, or a credential that matches no configured key.
    Unauthorized,

    // ========================================================================
    // Request validation
    // ========================================================================
    ValidationFailed,
    InvalidInput,
    /// Numeric parameter outside its permitted range.
    InvalidRange,
    /// Model tag that names no known recommender.
    UnsupportedModel,

    // ========================================================================
    // Lookup
    // ========================================================================
    ReaderNotFound,
    NotFound,

    // ========================================================================
    // Server / upstream
    // ========================================================================
    InternalError,
    DatabaseError,
    ServiceUnavailable,
    ConnectionPoolExhausted,
    /// Recommender replied with an error or garbage.
    UpstreamFailed,
    Timeout,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,

            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::InvalidRange
            | ErrorCode::UnsupportedModel => StatusCode::BAD_REQUEST,

            ErrorCode::ReaderNotFound | ErrorCode::NotFound => StatusCode::NOT_FOUND,

            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ErrorCode::ServiceUnavailable | ErrorCode::ConnectionPoolExhausted => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorCode::UpstreamFailed => StatusCode::BAD_GATEWAY,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Authentication required",
            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::InvalidInput => "Invalid input provided",
            ErrorCode::InvalidRange => "Value out of range",
            ErrorCode::UnsupportedModel => "Unsupported model",
            ErrorCode::ReaderNotFound => "Reader not found",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::ConnectionPoolExhausted => "Database connection pool exhausted",
            ErrorCode::UpstreamFailed => "Upstream recommender failed",
            ErrorCode::Timeout => "Operation timed out",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR
// ============================================================================

/// Error body returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn invalid_range(field: &str, min: i64, max: i64) -> Self {
        Self::new(
            ErrorCode::InvalidRange,
            format!("{} must be between {} and {}", field, min, max),
        )
        .with_details(serde_json::json!({ "field": field, "min": min, "max": max }))
    }

    pub fn unsupported_model(model: &str) -> Self {
        Self::new(
            ErrorCode::UnsupportedModel,
            format!("Unsupported model: {}", model),
        )
        .with_details(serde_json::json!({ "model": model }))
    }

    pub fn reader_not_found(reader_id: &str) -> Self {
        Self::new(
            ErrorCode::ReaderNotFound,
            format!("Reader {} not found", reader_id),
        )
        .with_details(serde_json::json!({ "reader_id": reader_id }))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn connection_pool_exhausted() -> Self {
        Self::from_code(ErrorCode::ConnectionPoolExhausted)
    }

    pub fn upstream_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamFailed, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<LecternError> for ApiError {
    fn from(err: LecternError) -> Self {
        match err {
            LecternError::Storage(e) => e.into(),
            LecternError::Llm(e) => e.into(),
            LecternError::Validation(e) => e.into(),
            LecternError::Config(e) => e.into(),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConnectionFailed { reason } => {
                tracing::error!(reason = %reason, "Datastore connection unavailable");
                ApiError::service_unavailable(format!("Datastore unavailable: {}", reason))
            }
            other => {
                tracing::error!(error = %other, "Datastore error");
                ApiError::database_error(other.to_string())
            }
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::ProviderNotConfigured { provider } => ApiError::service_unavailable(
                format!("Recommender '{}' is not configured", provider),
            ),
            LlmError::Timeout { .. } => ApiError::timeout(err.to_string()),
            other => ApiError::upstream_failed(other.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::OutOfRange { field, min, max, value } => {
                ApiError::invalid_range(&field, min, max)
                    .with_details(serde_json::json!({
                        "field": field,
                        "min": min,
                        "max": max,
                        "value": value,
                    }))
            }
            other => ApiError::validation_failed(other.to_string()),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ProviderNotSupported { provider } => ApiError::unsupported_model(&provider),
            ConfigError::InvalidValue { .. } => ApiError::invalid_input(err.to_string()),
            ConfigError::MissingRequired { .. } => ApiError::internal_error(err.to_string()),
        }
    }
}

impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        tracing::error!(error = %err, "PostgreSQL error");
        ApiError::database_error(err.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        match err {
            deadpool_postgres::PoolError::Timeout(_) => ApiError::connection_pool_exhausted(),
            deadpool_postgres::PoolError::Closed => {
                ApiError::service_unavailable("Connection pool closed")
            }
            other => ApiError::database_error(format!("Pool error: {}", other)),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::invalid_input(format!("JSON error: {}", err))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::InvalidRange.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::UnsupportedModel.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::ReaderNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::DatabaseError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::ConnectionPoolExhausted.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(ErrorCode::UpstreamFailed.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(ErrorCode::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_from_code_uses_default_message() {
        let err = ApiError::from_code(ErrorCode::ServiceUnavailable);
        assert_eq!(err.message, "Service temporarily unavailable");
        assert!(err.details.is_none());
    }

    #[test]
    fn test_unknown_model_is_bad_request() {
        let err: ApiError = LecternError::from(ConfigError::ProviderNotSupported {
            provider: "gpt-4".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::UnsupportedModel);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.details, Some(serde_json::json!({ "model": "gpt-4" })));
    }

    #[test]
    fn test_unconfigured_provider_is_unavailable() {
        let err: ApiError = LecternError::from(LlmError::ProviderNotConfigured {
            provider: "gemini".to_string(),
        })
        .into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.message.contains("gemini"));
    }

    #[test]
    fn test_storage_errors() {
        let err: ApiError = StorageError::ConnectionFailed {
            reason: "refused".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::ServiceUnavailable);

        let err: ApiError = StorageError::QueryFailed {
            reason: "syntax".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn test_llm_timeout_maps_to_gateway_timeout() {
        let err: ApiError = LlmError::Timeout {
            provider: "ollama".to_string(),
            timeout: Duration::from_secs(60),
        }
        .into();
        assert_eq!(err.code, ErrorCode::Timeout);
    }

    #[test]
    fn test_out_of_range_carries_value() {
        let err: ApiError = ValidationError::OutOfRange {
            field: "limit".to_string(),
            min: 1,
            max: 200,
            value: 500,
        }
        .into();
        assert_eq!(err.code, ErrorCode::InvalidRange);
        assert_eq!(err.details.as_ref().and_then(|d| d.get("value")), Some(&serde_json::json!(500)));
    }

    #[test]
    fn test_error_serialization() {
        let err = ApiError::reader_not_found("NOSUCH00000");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"code\":\"READER_NOT_FOUND\""));
        assert!(json.contains("NOSUCH00000"));

        let bare = serde_json::to_string(&ApiError::internal_error("boom")).unwrap();
        assert!(!bare.contains("details"));

        let back: ApiError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.code, ErrorCode::ReaderNotFound);
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::unauthorized("Invalid API key");
        assert_eq!(format!("{}", err), "Unauthorized: Invalid API key");
    }
}
