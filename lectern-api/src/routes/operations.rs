//! Operator endpoints for the composite history cache.
//!
//! Mounted behind the API key middleware.

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use lectern_storage::CacheStats;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::{AppState, HistoryCache};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CacheStatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub entry_count: u64,
    pub evictions: u64,
    pub capacity: u64,
    pub hit_rate: f64,
}

impl From<CacheStats> for CacheStatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            entry_count: stats.entry_count,
            evictions: stats.evictions,
            capacity: stats.capacity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CacheClearedResponse {
    /// Entries dropped by this call.
    pub cleared: usize,
}

/// GET /api/v1/operations/cache - Cache statistics
#[utoipa::path(
    get,
    path = "/api/v1/operations/cache",
    tag = "Operations",
    responses(
        (status = 200, description = "Cache statistics", body = CacheStatsResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(("api_key" = []))
)]
pub async fn cache_stats(State(cache): State<Arc<HistoryCache>>) -> ApiResult<impl IntoResponse> {
    let stats = cache.stats()?;
    Ok(Json(CacheStatsResponse::from(stats)))
}

/// DELETE /api/v1/operations/cache - Drop every cached composite result
#[utoipa::path(
    delete,
    path = "/api/v1/operations/cache",
    tag = "Operations",
    responses(
        (status = 200, description = "Cache cleared", body = CacheClearedResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(("api_key" = []))
)]
pub async fn clear_cache(State(cache): State<Arc<HistoryCache>>) -> ApiResult<impl IntoResponse> {
    let cleared = cache.clear().await?;
    tracing::info!(cleared, "Composite history cache cleared");
    Ok(Json(CacheClearedResponse { cleared }))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/cache", get(cache_stats).delete(clear_cache))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_response_carries_hit_rate() {
        let response = CacheStatsResponse::from(CacheStats {
            hits: 3,
            misses: 1,
            entry_count: 1,
            evictions: 0,
            capacity: 100,
        });
        assert!((response.hit_rate - 0.75).abs() < f64::EPSILON);
        assert_eq!(response.capacity, 100);
    }
}
