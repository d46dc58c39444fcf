//! Catalog entity types
//!
//! Readers, books and borrow records are produced by offline ingestion and
//! are read-only from the service's point of view. The composite history
//! types are derived values assembled per request.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::status::BorrowStatus;

/// Message carried by a successful composite lookup.
pub const MESSAGE_OK: &str = "ok";

/// Message carried by a composite lookup for an unknown reader.
pub const MESSAGE_READER_NOT_FOUND: &str = "reader not found";

// ============================================================================
// CATALOG ENTITIES
// ============================================================================

/// A library patron.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Reader {
    pub reader_id: String,
    pub department: Option<String>,
    pub reader_type: Option<String>,
    pub enroll_year: Option<i32>,
    pub gender: Option<String>,
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Book {
    pub book_id: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    /// Shelving code; the leading characters denote the subject category.
    pub call_no: Option<String>,
    pub language: Option<String>,
    pub doc_type: Option<String>,
}

// ============================================================================
// COMPOSITE HISTORY
// ============================================================================

/// Book attributes attached to a borrow record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BorrowedBook {
    pub book_id: String,
    pub title: Option<String>,
    pub call_no: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub publish_year: Option<i32>,
}

/// Reader attributes attached to a borrow record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BorrowerSummary {
    pub reader_id: String,
    pub department: Option<String>,
    pub reader_type: Option<String>,
    pub enroll_year: Option<i32>,
}

/// One loan joined with its book and reader.
///
/// `status` is the label stored in the datastore, kept verbatim.
/// `return_date` is `None` while the book is still out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BorrowRecord {
    pub borrow_id: String,
    pub borrow_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub status: String,
    pub book: BorrowedBook,
    pub reader: BorrowerSummary,
}

impl BorrowRecord {
    /// Status the stored label denotes, `None` when it is unrecognised.
    pub fn canonical_status(&self) -> Option<BorrowStatus> {
        BorrowStatus::classify(&self.status)
    }
}

/// Aggregate borrow counts for one reader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Statistics {
    pub total_records: i64,
    pub unique_books: i64,
    /// Count per status label, keyed in label order.
    pub status_count: BTreeMap<String, i64>,
}

impl Statistics {
    /// `total_records >= unique_books >= 0` and the per-status counts add up
    /// to `total_records`.
    pub fn is_consistent(&self) -> bool {
        let status_sum: i64 = self.status_count.values().sum();
        self.unique_books >= 0
            && self.total_records >= self.unique_books
            && status_sum == self.total_records
    }
}

/// Reader profile, recent loans and statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CompositeHistory {
    pub reader_info: Reader,
    pub borrow_records: Vec<BorrowRecord>,
    pub statistics: Statistics,
}

/// Result of a composite lookup. `data` is `None` exactly when `success` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HistoryResult {
    pub success: bool,
    pub message: String,
    pub data: Option<CompositeHistory>,
}

impl HistoryResult {
    pub fn found(data: CompositeHistory) -> Self {
        Self {
            success: true,
            message: MESSAGE_OK.to_string(),
            data: Some(data),
        }
    }

    pub fn not_found() -> Self {
        Self {
            success: false,
            message: MESSAGE_READER_NOT_FOUND.to_string(),
            data: None,
        }
    }
}

// ============================================================================
// BOOK LISTING
// ============================================================================

/// Columns the book listing may be ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Title,
    Author,
    PublicationYear,
    Publisher,
    CallNo,
}

impl SortField {
    /// Parse a column name; anything outside the whitelist falls back to `title`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "author" => SortField::Author,
            "publication_year" => SortField::PublicationYear,
            "publisher" => SortField::Publisher,
            "call_no" => SortField::CallNo,
            _ => SortField::Title,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            SortField::Title => "title",
            SortField::Author => "author",
            SortField::PublicationYear => "publication_year",
            SortField::Publisher => "publisher",
            SortField::CallNo => "call_no",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Parse `ASC`/`DESC` in any case; anything else is ascending.
    pub fn parse_lenient(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Search predicates; empty fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BookSearch {
    /// Substring matched against title, author and call number.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

/// One page of books.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BookPage {
    pub items: Vec<Book>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl BookPage {
    pub fn new(items: Vec<Book>, page: i64, limit: i64, total: i64) -> Self {
        Self {
            items,
            page,
            limit,
            total,
            total_pages: total_pages(total, limit),
        }
    }
}

/// `ceil(total / limit)`, zero for an empty result or a non-positive limit.
pub fn total_pages(total: i64, limit: i64) -> i64 {
    if limit <= 0 || total <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

// ============================================================================
// RECOMMENDATIONS
// ============================================================================

/// Title and author of a recently borrowed book, used to seed prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RecentBook {
    pub title: String,
    pub author: String,
}

/// A book suggested by a recommender.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RecommendedBook {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub introduction: String,
    #[serde(default)]
    pub reason: String,
}

/// A persisted recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RecommendationRecord {
    pub recommendation_id: i32,
    pub reader_id: String,
    pub model_used: Option<String>,
    pub recommended_book_title: Option<String>,
    pub recommended_book_author: Option<String>,
    pub recommendation_reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(total: i64, unique: i64, counts: &[(&str, i64)]) -> Statistics {
        Statistics {
            total_records: total,
            unique_books: unique,
            status_count: counts.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn test_statistics_consistency() {
        assert!(stats(3, 2, &[("returned", 2), ("overdue-returned", 1)]).is_consistent());
        assert!(Statistics::default().is_consistent());
        assert!(!stats(3, 4, &[("returned", 3)]).is_consistent());
        assert!(!stats(3, 2, &[("returned", 2)]).is_consistent());
    }

    #[test]
    fn test_history_result_constructors() {
        let missing = HistoryResult::not_found();
        assert!(!missing.success);
        assert_eq!(missing.message, "reader not found");
        assert!(missing.data.is_none());
    }

    #[test]
    fn test_not_found_serializes_null_data() -> Result<(), serde_json::Error> {
        let json = serde_json::to_value(HistoryResult::not_found())?;
        assert_eq!(
            json,
            serde_json::json!({"success": false, "message": "reader not found", "data": null})
        );
        Ok(())
    }

    #[test]
    fn test_sort_field_whitelist() {
        assert_eq!(SortField::parse_lenient("AUTHOR"), SortField::Author);
        assert_eq!(SortField::parse_lenient("call_no"), SortField::CallNo);
        assert_eq!(SortField::parse_lenient("title; DROP TABLE books"), SortField::Title);
        assert_eq!(SortField::parse_lenient(""), SortField::Title);
    }

    #[test]
    fn test_sort_order_lenient() {
        assert_eq!(SortOrder::parse_lenient("desc"), SortOrder::Desc);
        assert_eq!(SortOrder::parse_lenient("DESC"), SortOrder::Desc);
        assert_eq!(SortOrder::parse_lenient("sideways"), SortOrder::Asc);
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(1, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
        assert_eq!(total_pages(5, 0), 0);
    }

    #[test]
    fn test_canonical_status_reads_stored_label() {
        let mut record = BorrowRecord {
            borrow_id: "L1".to_string(),
            borrow_date: NaiveDate::default(),
            due_date: None,
            return_date: None,
            status: "已归还".to_string(),
            book: BorrowedBook {
                book_id: "B1".to_string(),
                title: None,
                call_no: None,
                author: None,
                publisher: None,
                publish_year: None,
            },
            reader: BorrowerSummary {
                reader_id: "R1".to_string(),
                department: None,
                reader_type: None,
                enroll_year: None,
            },
        };
        assert_eq!(record.canonical_status(), Some(BorrowStatus::Returned));
        record.status = "lost".to_string();
        assert_eq!(record.canonical_status(), None);
    }

    #[test]
    fn test_recommended_book_tolerates_missing_fields() -> Result<(), serde_json::Error> {
        let book: RecommendedBook = serde_json::from_str(r#"{"title": "三体"}"#)?;
        assert_eq!(book.title, "三体");
        assert!(book.author.is_empty());
        Ok(())
    }
}
