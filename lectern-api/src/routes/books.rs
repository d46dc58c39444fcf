//! Book catalog REST API Routes
//!
//! Paged listing with a whitelisted sort column and a filtered search.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use lectern_core::{BookSearch, SortField, SortOrder};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;
use crate::validation::{resolve_limit, resolve_page};

/// Books per page when the caller gives no `limit`.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct ListBooksParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// `title`, `author`, `publication_year`, `publisher` or `call_no`.
    /// Anything else sorts by title.
    pub sort_by: Option<String>,
    /// `ASC` or `DESC`; anything else is ascending.
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct SearchBooksParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Substring of title, author or call number.
    pub search: Option<String>,
    pub language: Option<String>,
    pub year: Option<i32>,
    pub publisher: Option<String>,
    pub author: Option<String>,
}

impl SearchBooksParams {
    fn filter(&self) -> BookSearch {
        BookSearch {
            search: self.search.clone(),
            language: self.language.clone(),
            year: self.year,
            publisher: self.publisher.clone(),
            author: self.author.clone(),
        }
    }
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/v1/query/books - Paged catalog listing
#[utoipa::path(
    get,
    path = "/api/v1/query/books",
    tag = "Books",
    params(ListBooksParams),
    responses(
        (status = 200, description = "One page of books", body = lectern_core::BookPage),
        (status = 400, description = "Invalid page or limit", body = crate::error::ApiError),
    ),
)]
pub async fn list_books(
    State(state): State<AppState>,
    Query(params): Query<ListBooksParams>,
) -> ApiResult<impl IntoResponse> {
    let page = resolve_page(params.page)?;
    let limit = resolve_limit(params.limit, DEFAULT_PAGE_SIZE, state.config.history.max_limit)?;
    let sort = SortField::parse_lenient(params.sort_by.as_deref().unwrap_or_default());
    let order = SortOrder::parse_lenient(params.sort_order.as_deref().unwrap_or_default());

    let books = state.query.list_books(page, limit, sort, order).await?;
    Ok(Json(books))
}

/// GET /api/v1/query/books/search - Filtered catalog search
#[utoipa::path(
    get,
    path = "/api/v1/query/books/search",
    tag = "Books",
    params(SearchBooksParams),
    responses(
        (status = 200, description = "One page of matching books, by title", body = lectern_core::BookPage),
        (status = 400, description = "Invalid page or limit", body = crate::error::ApiError),
    ),
)]
pub async fn search_books(
    State(state): State<AppState>,
    Query(params): Query<SearchBooksParams>,
) -> ApiResult<impl IntoResponse> {
    let page = resolve_page(params.page)?;
    let limit = resolve_limit(params.limit, DEFAULT_PAGE_SIZE, state.config.history.max_limit)?;

    let books = state.query.search_books(&params.filter(), page, limit).await?;
    Ok(Json(books))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_books))
        .route("/search", get(search_books))
}
