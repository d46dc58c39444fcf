//! Lectern API - HTTP Query Service
//!
//! Axum REST layer over the Lectern catalog. Reads go through the
//! datastore gateway (PostgreSQL in production), composite histories are
//! served from a bounded recency cache, and recommendations are produced by
//! a configurable language model and saved to the recommendation history.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod macros;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod validation;

// Re-export commonly used types
pub use auth::{validate_api_key, AuthConfig, API_KEY_HEADER};
pub use config::{ApiConfig, ServiceConfig};
pub use db::{DbConfig, PgDatastore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{api_key_middleware, AuthMiddlewareState};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use services::{RecommendationParams, RecommendationResponse, RecommendationService};
pub use state::{AppState, HistoryCache};
