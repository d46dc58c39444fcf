//! Reader REST API Routes
//!
//! Reader profile, borrow history, the cached composite history and the
//! recommendation endpoints, all keyed by reader id.

use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use lectern_core::{to_object, BorrowRecord, BorrowStatus, RecommendationRecord};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::services::RecommendationParams;
use crate::state::AppState;
use crate::validation::{resolve_limit, ValidateNonEmpty};

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct HistoryParams {
    /// Maximum records returned.
    pub limit: Option<i64>,
    /// Keep only records whose status label denotes this status
    /// (`borrowed`, `returned`, `overdue`, `renewed` or a Chinese alias).
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct LimitParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BorrowHistoryResponse {
    pub reader_id: String,
    pub count: usize,
    pub records: Vec<BorrowRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RecommendationHistoryResponse {
    pub reader_id: String,
    pub count: usize,
    pub records: Vec<RecommendationRecord>,
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/v1/query/readers/{reader_id} - Reader profile
#[utoipa::path(
    get,
    path = "/api/v1/query/readers/{reader_id}",
    tag = "Readers",
    params(
        ("reader_id" = String, Path, description = "Reader ID")
    ),
    responses(
        (status = 200, description = "Reader profile", body = lectern_core::Reader),
        (status = 404, description = "Reader not found", body = ApiError),
    ),
)]
pub async fn get_reader(
    State(state): State<AppState>,
    Path(reader_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    reader_id.as_str().validate_non_empty("reader_id")?;
    let reader = state
        .query
        .reader_info(&reader_id)
        .await?
        .ok_or_else(|| ApiError::reader_not_found(&reader_id))?;
    Ok(Json(reader))
}

/// GET /api/v1/query/readers/{reader_id}/history - Enriched borrow records
#[utoipa::path(
    get,
    path = "/api/v1/query/readers/{reader_id}/history",
    tag = "Readers",
    params(
        ("reader_id" = String, Path, description = "Reader ID"),
        HistoryParams,
    ),
    responses(
        (status = 200, description = "Borrow records, newest first", body = BorrowHistoryResponse),
        (status = 400, description = "Invalid limit or status", body = ApiError),
        (status = 404, description = "Reader not found", body = ApiError),
    ),
)]
pub async fn get_history(
    State(state): State<AppState>,
    Path(reader_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<impl IntoResponse> {
    reader_id.as_str().validate_non_empty("reader_id")?;
    let settings = &state.config.history;
    let limit = resolve_limit(params.limit, settings.default_limit, settings.max_limit)?;
    let status = params
        .status
        .as_deref()
        .map(BorrowStatus::from_str)
        .transpose()?;

    if state.query.reader_info(&reader_id).await?.is_none() {
        return Err(ApiError::reader_not_found(&reader_id));
    }

    let mut records = state.query.borrow_history(&reader_id, limit).await?;
    if let Some(status) = status {
        records.retain(|r| r.canonical_status() == Some(status));
    }

    Ok(Json(BorrowHistoryResponse {
        reader_id,
        count: records.len(),
        records,
    }))
}

/// GET /api/v1/query/readers/{reader_id}/full-history - Cached composite history
///
/// An unknown reader yields the structured not-found result with a 404.
#[utoipa::path(
    get,
    path = "/api/v1/query/readers/{reader_id}/full-history",
    tag = "Readers",
    params(
        ("reader_id" = String, Path, description = "Reader ID"),
        LimitParams,
    ),
    responses(
        (status = 200, description = "Composite history", body = lectern_core::HistoryResult),
        (status = 400, description = "Invalid limit", body = ApiError),
        (status = 404, description = "Reader not found", body = lectern_core::HistoryResult),
    ),
)]
pub async fn get_full_history(
    State(state): State<AppState>,
    Path(reader_id): Path<String>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Response> {
    reader_id.as_str().validate_non_empty("reader_id")?;
    let settings = &state.config.history;
    let limit = resolve_limit(params.limit, settings.default_limit, settings.max_limit)?;

    let result = state.cache.get(&reader_id, limit).await?;
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    Ok((status, Json(to_object(&result)?)).into_response())
}

/// GET /api/v1/query/readers/{reader_id}/recommendations - Model recommendations
///
/// Answers 200 whenever the request itself was valid; `success` tells
/// whether recommendations were produced and saved.
#[utoipa::path(
    get,
    path = "/api/v1/query/readers/{reader_id}/recommendations",
    tag = "Recommendations",
    params(
        ("reader_id" = String, Path, description = "Reader ID"),
        RecommendationParams,
    ),
    responses(
        (status = 200, description = "Recommendation outcome", body = crate::services::RecommendationResponse),
        (status = 400, description = "Unknown model or invalid limit", body = ApiError),
        (status = 503, description = "Model not configured", body = ApiError),
    ),
)]
pub async fn get_recommendations(
    State(state): State<AppState>,
    Path(reader_id): Path<String>,
    Query(params): Query<RecommendationParams>,
) -> ApiResult<impl IntoResponse> {
    reader_id.as_str().validate_non_empty("reader_id")?;
    let response = state.recommendations.recommend(&reader_id, params).await?;
    Ok(Json(response))
}

/// GET /api/v1/query/readers/{reader_id}/recommendation-history - Saved recommendations
#[utoipa::path(
    get,
    path = "/api/v1/query/readers/{reader_id}/recommendation-history",
    tag = "Recommendations",
    params(
        ("reader_id" = String, Path, description = "Reader ID"),
        LimitParams,
    ),
    responses(
        (status = 200, description = "Saved recommendations, newest first", body = RecommendationHistoryResponse),
        (status = 400, description = "Invalid limit", body = ApiError),
    ),
)]
pub async fn get_recommendation_history(
    State(state): State<AppState>,
    Path(reader_id): Path<String>,
    Query(params): Query<LimitParams>,
) -> ApiResult<impl IntoResponse> {
    reader_id.as_str().validate_non_empty("reader_id")?;
    let settings = &state.config.history;
    let limit = resolve_limit(params.limit, settings.default_limit, settings.max_limit)?;

    let records = state.query.recommendation_history(&reader_id, limit).await?;
    Ok(Json(RecommendationHistoryResponse {
        reader_id,
        count: records.len(),
        records,
    }))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/:reader_id", get(get_reader))
        .route("/:reader_id/history", get(get_history))
        .route("/:reader_id/full-history", get(get_full_history))
        .route("/:reader_id/recommendations", get(get_recommendations))
        .route(
            "/:reader_id/recommendation-history",
            get(get_recommendation_history),
        )
}
