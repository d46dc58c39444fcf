//! Axum middleware guarding operator endpoints with an API key.
//!
//! Rejects with 401 before the handler runs, whatever the handler would
//! have done.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::auth::{validate_api_key, AuthConfig, API_KEY_HEADER};
use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct AuthMiddlewareState {
    pub auth_config: Arc<AuthConfig>,
}

impl AuthMiddlewareState {
    pub fn new(auth_config: AuthConfig) -> Self {
        Self {
            auth_config: Arc::new(auth_config),
        }
    }
}

/// Require a valid `X-API-Key` header.
///
/// ```ignore
/// let app = Router::new()
///     .route("/operations/cache", get(cache_stats))
///     .layer(middleware::from_fn_with_state(auth_state, api_key_middleware));
/// ```
pub async fn api_key_middleware(
    State(state): State<AuthMiddlewareState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let api_key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok());

    if let Err(err) = validate_api_key(&state.auth_config, api_key) {
        tracing::warn!(
            path = %request.uri().path(),
            key_present = api_key.is_some(),
            "Rejected operator request"
        );
        return Err(err);
    }

    Ok(next.run(request).await)
}
