//! SQL statements used by the query layer.
//!
//! Fixed statements are constants. The book listing and search statements
//! depend on caller input and are built by the functions at the bottom;
//! identifiers come only from [`SortField`]/[`SortOrder`], values are
//! always bound as parameters.

use lectern_core::{BookSearch, SortField, SortOrder};

use crate::datastore::SqlValue;

pub const READER_BY_ID: &str =
    "SELECT reader_id, department, reader_type, enroll_year, gender FROM readers WHERE reader_id = $1";

pub const BORROW_HISTORY: &str = "SELECT br.borrow_id, br.reader_id, br.book_id, br.borrow_date, br.due_date, \
br.return_date, br.status, b.title AS book_title, b.call_no, b.author, b.publisher, \
b.publication_year AS publish_year, r.department AS reader_department, r.reader_type, r.enroll_year \
FROM borrow_records br \
JOIN books b ON br.book_id = b.book_id \
JOIN readers r ON br.reader_id = r.reader_id \
WHERE br.reader_id = $1 \
ORDER BY br.borrow_date DESC, br.borrow_id DESC \
LIMIT $2";

pub const READER_TOTALS: &str = "SELECT COUNT(*) AS total_records, COUNT(DISTINCT book_id) AS unique_books \
FROM borrow_records WHERE reader_id = $1";

pub const READER_STATUS_COUNTS: &str =
    "SELECT status, COUNT(*) AS count FROM borrow_records WHERE reader_id = $1 GROUP BY status";

pub const RECOMMENDATION_INSERT: &str = "INSERT INTO recommendation_history \
(reader_id, model_used, recommended_book_title, recommended_book_author, recommendation_reason) \
VALUES ($1, $2, $3, $4, $5)";

pub const RECOMMENDATION_HISTORY: &str = "SELECT recommendation_id, reader_id, model_used, \
recommended_book_title, recommended_book_author, recommendation_reason, created_at \
FROM recommendation_history WHERE reader_id = $1 \
ORDER BY created_at DESC, recommendation_id DESC \
LIMIT $2";

/// Columns returned for every book row.
pub const BOOK_COLUMNS: &str =
    "book_id, title, author, publisher, publication_year, call_no, language, doc_type";

/// A statement and its bound parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Count and page statements for one book query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookQuery {
    pub count: Statement,
    pub page: Statement,
}

/// `(page - 1) * limit`, never negative.
pub fn page_offset(page: i64, limit: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(limit.max(0))
}

/// Paginated, sorted listing of the whole catalog.
pub fn book_listing(sort: SortField, order: SortOrder, limit: i64, offset: i64) -> BookQuery {
    BookQuery {
        count: Statement {
            sql: "SELECT COUNT(*) AS count FROM books".to_string(),
            params: Vec::new(),
        },
        page: Statement {
            sql: format!(
                "SELECT {} FROM books ORDER BY {} {}, book_id ASC LIMIT $1 OFFSET $2",
                BOOK_COLUMNS,
                sort.column(),
                order.keyword()
            ),
            params: vec![SqlValue::BigInt(limit), SqlValue::BigInt(offset)],
        },
    }
}

/// Multi-predicate search, ordered by title.
///
/// `search` matches title, author or call number as a case-insensitive
/// substring; `language` and `year` match exactly; `publisher` and `author`
/// match as substrings. Predicates are joined with AND.
pub fn book_search(filter: &BookSearch, limit: i64, offset: i64) -> BookQuery {
    let mut conditions: Vec<String> = Vec::new();
    let mut params: Vec<SqlValue> = Vec::new();

    if let Some(term) = non_empty(&filter.search) {
        let pattern = like_pattern(term);
        let a = bind(&mut params, SqlValue::Text(pattern.clone()));
        let b = bind(&mut params, SqlValue::Text(pattern.clone()));
        let c = bind(&mut params, SqlValue::Text(pattern));
        conditions.push(format!(
            "(title ILIKE {} OR author ILIKE {} OR call_no ILIKE {})",
            a, b, c
        ));
    }
    if let Some(language) = non_empty(&filter.language) {
        let p = bind(&mut params, SqlValue::Text(language.to_string()));
        conditions.push(format!("language = {}", p));
    }
    if let Some(year) = filter.year {
        let p = bind(&mut params, SqlValue::Int(year));
        conditions.push(format!("publication_year = {}", p));
    }
    if let Some(publisher) = non_empty(&filter.publisher) {
        let p = bind(&mut params, SqlValue::Text(like_pattern(publisher)));
        conditions.push(format!("publisher ILIKE {}", p));
    }
    if let Some(author) = non_empty(&filter.author) {
        let p = bind(&mut params, SqlValue::Text(like_pattern(author)));
        conditions.push(format!("author ILIKE {}", p));
    }

    let where_clause = if conditions.is_empty() {
        "TRUE".to_string()
    } else {
        conditions.join(" AND ")
    };

    let count = Statement {
        sql: format!("SELECT COUNT(*) AS count FROM books WHERE {}", where_clause),
        params: params.clone(),
    };

    let limit_slot = params.len() + 1;
    let mut page_params = params;
    page_params.push(SqlValue::BigInt(limit));
    page_params.push(SqlValue::BigInt(offset));

    BookQuery {
        count,
        page: Statement {
            sql: format!(
                "SELECT {} FROM books WHERE {} ORDER BY title ASC, book_id ASC LIMIT ${} OFFSET ${}",
                BOOK_COLUMNS,
                where_clause,
                limit_slot,
                limit_slot + 1
            ),
            params: page_params,
        },
    }
}

/// Append a parameter and return its placeholder.
fn bind(params: &mut Vec<SqlValue>, value: SqlValue) -> String {
    params.push(value);
    format!("${}", params.len())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// `%term%` with LIKE metacharacters in `term` escaped.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_statement_has_deterministic_order() {
        assert!(BORROW_HISTORY.contains("ORDER BY br.borrow_date DESC, br.borrow_id DESC"));
        assert!(BORROW_HISTORY.contains("LIMIT $2"));
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(0, 20), 0);
    }

    #[test]
    fn test_book_listing_uses_whitelisted_identifiers() {
        let query = book_listing(SortField::PublicationYear, SortOrder::Desc, 20, 40);
        assert!(query
            .page
            .sql
            .contains("ORDER BY publication_year DESC, book_id ASC LIMIT $1 OFFSET $2"));
        assert_eq!(
            query.page.params,
            vec![SqlValue::BigInt(20), SqlValue::BigInt(40)]
        );
        assert!(query.count.params.is_empty());
    }

    #[test]
    fn test_book_search_without_predicates_matches_everything() {
        let query = book_search(&BookSearch::default(), 10, 0);
        assert!(query.count.sql.ends_with("WHERE TRUE"));
        assert!(query.page.sql.contains("LIMIT $1 OFFSET $2"));
        assert_eq!(query.page.params.len(), 2);
    }

    #[test]
    fn test_book_search_binds_each_predicate() {
        let filter = BookSearch {
            search: Some("rust".to_string()),
            language: Some("eng".to_string()),
            year: Some(2021),
            publisher: Some("O'Reilly".to_string()),
            author: Some("  ".to_string()),
        };
        let query = book_search(&filter, 20, 20);

        assert!(query
            .count
            .sql
            .contains("(title ILIKE $1 OR author ILIKE $2 OR call_no ILIKE $3)"));
        assert!(query.count.sql.contains("language = $4"));
        assert!(query.count.sql.contains("publication_year = $5"));
        assert!(query.count.sql.contains("publisher ILIKE $6"));
        assert!(!query.count.sql.contains("author ILIKE $7"));
        assert!(query.page.sql.contains("LIMIT $7 OFFSET $8"));

        assert_eq!(query.count.params.len(), 6);
        assert_eq!(query.count.params[0], SqlValue::Text("%rust%".to_string()));
        assert_eq!(query.count.params[4], SqlValue::Int(2021));
        assert_eq!(query.page.params[6], SqlValue::BigInt(20));
        assert_eq!(query.page.params[7], SqlValue::BigInt(20));
    }

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("数据库"), "%数据库%");
    }
}
