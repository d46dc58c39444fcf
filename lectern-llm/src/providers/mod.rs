//! Recommender backends.
//!
//! Each backend implements [`crate::Recommender`] over plain HTTP with
//! `reqwest`. Errors are built with the two helpers below so every provider
//! reports failures the same way.

pub mod gemini;
pub mod ollama;

pub use gemini::GeminiRecommender;
pub use ollama::OllamaRecommender;

use lectern_core::{LecternError, LlmError};

/// Transport or HTTP-status failure. `status` is 0 when no response arrived.
pub(crate) fn request_failed(provider: &str, status: i32, message: impl Into<String>) -> LecternError {
    LlmError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    }
    .into()
}

/// Response arrived but did not have the expected shape.
pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> LecternError {
    LlmError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    }
    .into()
}

/// Read an error body, falling back to a placeholder when it cannot be read.
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string())
}
