//! REST API Routes Module
//!
//! - Reader, history and recommendation routes under /api/v1/query/readers
//! - Book listing and search under /api/v1/query/books
//! - Cache operations under /api/v1/operations (API key required)
//! - Health checks (Kubernetes-compatible), metrics and the OpenAPI document
//! - CORS support for browser-based clients

pub mod books;
pub mod health;
pub mod operations;
pub mod readers;

use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::auth::{AuthConfig, API_KEY_HEADER};
use crate::config::ApiConfig;
use crate::middleware::{api_key_middleware, AuthMiddlewareState};
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use books::create_router as books_router;
pub use health::create_router as health_router;
pub use operations::create_router as operations_router;
pub use readers::create_router as readers_router;

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// With no configured origins every origin is allowed (development).
/// The API is read-mostly, so only GET, DELETE and preflight are permitted.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(API_KEY_HEADER),
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the complete API router.
///
/// - Query routes under /api/v1/query/* (public)
/// - Cache operations under /api/v1/operations/* (API key)
/// - Health checks at /health/*, metrics at /metrics
/// - OpenAPI spec at /openapi.json, Swagger UI at /swagger-ui (swagger-ui feature)
///
/// Execution order: CORS -> Trace -> Concurrency limit -> Observability -> Handler
pub fn create_api_router(state: AppState, api_config: &ApiConfig, auth_config: AuthConfig) -> Router {
    if auth_config.key_count() == 0 {
        tracing::warn!("No API keys configured: operator endpoints will reject every request");
    }
    let auth_state = AuthMiddlewareState::new(auth_config);

    let operations = operations::create_router()
        .route_layer(from_fn_with_state(auth_state, api_key_middleware));

    let api_routes = Router::new()
        .nest("/query/readers", readers::create_router())
        .nest("/query/books", books::create_router())
        .nest("/operations", operations);

    #[allow(unused_mut)]
    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health::create_router())
        .route("/metrics", get(metrics_handler))
        .route("/openapi.json", get(openapi_json));

    #[cfg(feature = "swagger-ui")]
    {
        use utoipa_swagger_ui::SwaggerUi;
        router = router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    router
        .layer(from_fn(observability_middleware))
        .layer(ConcurrencyLimitLayer::new(api_config.max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(api_config))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_builds_for_both_modes() {
        let _dev = build_cors_layer(&ApiConfig::default());
        let _prod = build_cors_layer(&ApiConfig {
            cors_origins: vec!["https://library.example.edu".to_string()],
            cors_allow_credentials: true,
            ..ApiConfig::default()
        });
    }
}
