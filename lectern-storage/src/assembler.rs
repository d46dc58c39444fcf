//! Composite query assembly.
//!
//! [`LibraryQuery`] turns gateway rows into catalog types. The composite
//! lookup runs reader, history and statistics queries on one session, in
//! that order, and stops after the reader query when the reader is absent.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use lectern_core::{
    Book, BookPage, BookSearch, BorrowRecord, BorrowedBook, BorrowerSummary, CompositeHistory,
    HistoryResult, LecternResult, Reader, RecentBook, RecommendationRecord, RecommendedBook,
    SortField, SortOrder, Statistics,
};
use serde::Deserialize;

use crate::datastore::{decode_row, decode_rows, SqlValue};
use crate::gateway::{Gateway, GatewaySession};
use crate::queries::{self, BookQuery};

/// Anything that can produce a composite history for `(reader_id, limit)`.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn composite_history(&self, reader_id: &str, limit: i64) -> LecternResult<HistoryResult>;
}

// ============================================================================
// ROW SHAPES
// ============================================================================

/// Flat row of the borrow-history join.
#[derive(Debug, Deserialize)]
struct HistoryRow {
    borrow_id: String,
    reader_id: String,
    book_id: String,
    borrow_date: NaiveDate,
    due_date: Option<NaiveDate>,
    return_date: Option<NaiveDate>,
    status: Option<String>,
    book_title: Option<String>,
    call_no: Option<String>,
    author: Option<String>,
    publisher: Option<String>,
    publish_year: Option<i32>,
    reader_department: Option<String>,
    reader_type: Option<String>,
    enroll_year: Option<i32>,
}

impl From<HistoryRow> for BorrowRecord {
    fn from(row: HistoryRow) -> Self {
        BorrowRecord {
            borrow_id: row.borrow_id,
            borrow_date: row.borrow_date,
            due_date: row.due_date,
            return_date: row.return_date,
            status: row.status.unwrap_or_default(),
            book: BorrowedBook {
                book_id: row.book_id,
                title: row.book_title,
                call_no: row.call_no,
                author: row.author,
                publisher: row.publisher,
                publish_year: row.publish_year,
            },
            reader: BorrowerSummary {
                reader_id: row.reader_id,
                department: row.reader_department,
                reader_type: row.reader_type,
                enroll_year: row.enroll_year,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TotalsRow {
    #[serde(default)]
    total_records: i64,
    #[serde(default)]
    unique_books: i64,
}

#[derive(Debug, Deserialize)]
struct StatusCountRow {
    status: Option<String>,
    count: i64,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: i64,
}

// ============================================================================
// SESSION-LEVEL STEPS
// ============================================================================

async fn fetch_reader(session: &mut GatewaySession, reader_id: &str) -> LecternResult<Option<Reader>> {
    session
        .query_one(queries::READER_BY_ID, &[SqlValue::from(reader_id)])
        .await?
        .map(|row| decode_row(row, "Reader"))
        .transpose()
}

async fn fetch_history(
    session: &mut GatewaySession,
    reader_id: &str,
    limit: i64,
) -> LecternResult<Vec<BorrowRecord>> {
    let rows = session
        .query_many(
            queries::BORROW_HISTORY,
            &[SqlValue::from(reader_id), SqlValue::BigInt(limit)],
        )
        .await?;
    let rows: Vec<HistoryRow> = decode_rows(rows, "BorrowRecord")?;
    Ok(rows.into_iter().map(BorrowRecord::from).collect())
}

async fn fetch_statistics(session: &mut GatewaySession, reader_id: &str) -> LecternResult<Statistics> {
    let params = [SqlValue::from(reader_id)];

    let totals: TotalsRow = session
        .query_one(queries::READER_TOTALS, &params)
        .await?
        .map(|row| decode_row(row, "Statistics"))
        .transpose()?
        .unwrap_or_default();

    let rows = session.query_many(queries::READER_STATUS_COUNTS, &params).await?;
    let mut status_count = BTreeMap::new();
    for row in decode_rows::<StatusCountRow>(rows, "StatusCount")? {
        *status_count.entry(row.status.unwrap_or_default()).or_insert(0) += row.count;
    }

    Ok(Statistics {
        total_records: totals.total_records,
        unique_books: totals.unique_books,
        status_count,
    })
}

async fn fetch_book_page(
    session: &mut GatewaySession,
    query: BookQuery,
    page: i64,
    limit: i64,
) -> LecternResult<BookPage> {
    let total = session
        .query_one(&query.count.sql, &query.count.params)
        .await?
        .map(|row| decode_row::<CountRow>(row, "BookCount"))
        .transpose()?
        .map(|c| c.count)
        .unwrap_or(0);

    let rows = session.query_many(&query.page.sql, &query.page.params).await?;
    let items: Vec<Book> = decode_rows(rows, "Book")?;
    Ok(BookPage::new(items, page, limit, total))
}

// ============================================================================
// LIBRARY QUERY
// ============================================================================

/// Read queries over readers, books and borrow records.
#[derive(Debug, Clone)]
pub struct LibraryQuery {
    gateway: Gateway,
}

impl LibraryQuery {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Single reader by id.
    pub async fn reader_info(&self, reader_id: &str) -> LecternResult<Option<Reader>> {
        let mut session = self.gateway.session().await?;
        fetch_reader(&mut session, reader_id).await
    }

    /// Most recent `limit` loans, newest first, ties broken by borrow id.
    pub async fn borrow_history(&self, reader_id: &str, limit: i64) -> LecternResult<Vec<BorrowRecord>> {
        let mut session = self.gateway.session().await?;
        fetch_history(&mut session, reader_id, limit).await
    }

    /// Totals and per-status counts; zeroes when the reader has no loans.
    pub async fn statistics(&self, reader_id: &str) -> LecternResult<Statistics> {
        let mut session = self.gateway.session().await?;
        fetch_statistics(&mut session, reader_id).await
    }

    /// Reader profile, recent loans and statistics in one unit of work.
    pub async fn assemble_history(&self, reader_id: &str, limit: i64) -> LecternResult<HistoryResult> {
        let mut session = self.gateway.session().await?;

        let Some(reader_info) = fetch_reader(&mut session, reader_id).await? else {
            tracing::debug!(reader_id, "Reader not found");
            return Ok(HistoryResult::not_found());
        };

        let borrow_records = fetch_history(&mut session, reader_id, limit).await?;
        let statistics = fetch_statistics(&mut session, reader_id).await?;

        Ok(HistoryResult::found(CompositeHistory {
            reader_info,
            borrow_records,
            statistics,
        }))
    }

    /// Titles and authors of the most recent loans. Any failure, including
    /// a session that cannot be opened, yields an empty list.
    pub async fn recent_books(&self, reader_id: &str, limit: i64) -> LecternResult<Vec<RecentBook>> {
        let records = match self.borrow_history(reader_id, limit).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(reader_id, error = %e, "Recent books unavailable, continuing without history");
                return Ok(Vec::new());
            }
        };
        Ok(records
            .into_iter()
            .map(|r| RecentBook {
                title: r.book.title.unwrap_or_default(),
                author: r.book.author.unwrap_or_default(),
            })
            .collect())
    }

    /// One page of the catalog in the requested order.
    pub async fn list_books(
        &self,
        page: i64,
        limit: i64,
        sort: SortField,
        order: SortOrder,
    ) -> LecternResult<BookPage> {
        let query = queries::book_listing(sort, order, limit, queries::page_offset(page, limit));
        let mut session = self.gateway.session().await?;
        fetch_book_page(&mut session, query, page, limit).await
    }

    /// One page of books matching every given predicate, by title.
    pub async fn search_books(
        &self,
        filter: &BookSearch,
        page: i64,
        limit: i64,
    ) -> LecternResult<BookPage> {
        let query = queries::book_search(filter, limit, queries::page_offset(page, limit));
        let mut session = self.gateway.session().await?;
        fetch_book_page(&mut session, query, page, limit).await
    }

    /// Stored recommendations for a reader, newest first.
    pub async fn recommendation_history(
        &self,
        reader_id: &str,
        limit: i64,
    ) -> LecternResult<Vec<RecommendationRecord>> {
        let mut session = self.gateway.session().await?;
        let rows = session
            .query_many(
                queries::RECOMMENDATION_HISTORY,
                &[SqlValue::from(reader_id), SqlValue::BigInt(limit)],
            )
            .await?;
        decode_rows(rows, "RecommendationRecord")
    }

    /// Persist recommendations in one batch. `true` when all rows were written.
    pub async fn record_recommendations(
        &self,
        reader_id: &str,
        model: &str,
        items: &[RecommendedBook],
    ) -> LecternResult<bool> {
        let rows: Vec<Vec<SqlValue>> = items
            .iter()
            .map(|item| {
                vec![
                    SqlValue::from(reader_id),
                    SqlValue::from(model),
                    SqlValue::from(item.title.as_str()),
                    SqlValue::from(item.author.as_str()),
                    SqlValue::from(item.reason.as_str()),
                ]
            })
            .collect();

        let mut session = self.gateway.session().await?;
        session.batch_insert(queries::RECOMMENDATION_INSERT, &rows).await
    }
}

#[async_trait]
impl HistorySource for LibraryQuery {
    async fn composite_history(&self, reader_id: &str, limit: i64) -> LecternResult<HistoryResult> {
        self.assemble_history(reader_id, limit).await
    }
}
