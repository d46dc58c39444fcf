//! OpenAPI Specification for the Lectern API
//!
//! Generated with utoipa from the route annotations and response types.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, ErrorCode};
use crate::routes::books;
use crate::routes::health::{self, ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::operations::{self, CacheClearedResponse, CacheStatsResponse};
use crate::routes::readers::{self, BorrowHistoryResponse, RecommendationHistoryResponse};
use crate::services::RecommendationResponse;
use crate::telemetry::metrics;

use lectern_core::{
    Book, BookPage, BookSearch, BorrowRecord, BorrowStatus, BorrowedBook, BorrowerSummary,
    CompositeHistory, HistoryResult, Reader, RecentBook, RecommendationRecord, RecommendedBook,
    SortField, SortOrder, Statistics,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lectern API",
        version = "0.1.0",
        description = "Library catalog queries: reader histories, book listings and model-backed recommendations",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Readers", description = "Reader profiles and borrow history"),
        (name = "Books", description = "Catalog listing and search"),
        (name = "Recommendations", description = "Model-backed book recommendations"),
        (name = "Operations", description = "Operator endpoints (API key required)"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        readers::get_reader,
        readers::get_history,
        readers::get_full_history,
        readers::get_recommendations,
        readers::get_recommendation_history,
        books::list_books,
        books::search_books,
        operations::cache_stats,
        operations::clear_cache,
        health::ping,
        health::liveness,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(
        schemas(
            ApiError, ErrorCode,
            Reader, Book, BookPage, BookSearch, SortField, SortOrder,
            BorrowRecord, BorrowedBook, BorrowerSummary, BorrowStatus, Statistics,
            CompositeHistory, HistoryResult,
            RecentBook, RecommendedBook, RecommendationRecord,
            BorrowHistoryResponse, RecommendationHistoryResponse, RecommendationResponse,
            CacheStatsResponse, CacheClearedResponse,
            HealthResponse, HealthStatus, HealthDetails, ComponentHealth
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
        }
    }
}

impl ApiDoc {
    /// OpenAPI document as pretty-printed JSON.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
