//! In-memory datastore for tests.
//!
//! Understands the fixed statements in [`crate::queries`] and the book
//! listing/search statements (predicates are not evaluated: every book
//! matches). Each statement's call count is recorded, and failures can be
//! injected per statement or for session acquisition.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use lectern_core::{Book, LecternResult, Reader, RecommendationRecord, StorageError};
use serde::Serialize;
use serde_json::{json, Value};

use crate::datastore::{Datastore, DatastoreSession, Row, SqlValue};
use crate::queries;

/// A raw borrow record as stored in `borrow_records`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanRow {
    pub borrow_id: String,
    pub reader_id: String,
    pub book_id: String,
    pub borrow_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub status: String,
}

#[derive(Debug, Default)]
struct MockState {
    readers: BTreeMap<String, Reader>,
    books: BTreeMap<String, Book>,
    loans: Vec<LoanRow>,
    recommendations: Vec<RecommendationRecord>,
    calls: HashMap<String, usize>,
    failing: HashSet<String>,
    fail_sessions: bool,
    open_sessions: usize,
    sessions_opened: usize,
}

/// Shared in-memory datastore. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDatastore {
    state: Arc<Mutex<MockState>>,
}

impl InMemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> LecternResult<MutexGuard<'_, MockState>> {
        self.state
            .lock()
            .map_err(|_| StorageError::LockPoisoned.into())
    }

    fn read<T: Default>(&self, f: impl FnOnce(&MockState) -> T) -> T {
        self.state().map(|s| f(&s)).unwrap_or_default()
    }

    fn write(&self, f: impl FnOnce(&mut MockState)) {
        if let Ok(mut state) = self.state() {
            f(&mut state);
        }
    }

    // === Fixture loading ===

    pub fn add_reader(&self, reader: Reader) {
        self.write(|s| {
            s.readers.insert(reader.reader_id.clone(), reader);
        });
    }

    pub fn add_book(&self, book: Book) {
        self.write(|s| {
            s.books.insert(book.book_id.clone(), book);
        });
    }

    pub fn add_loan(&self, loan: LoanRow) {
        self.write(|s| s.loans.push(loan));
    }

    // === Failure injection ===

    /// Make every later call of `sql` fail.
    pub fn fail_statement(&self, sql: &str) {
        self.write(|s| {
            s.failing.insert(sql.to_string());
        });
    }

    /// Make session acquisition fail (or succeed again).
    pub fn fail_sessions(&self, fail: bool) {
        self.write(|s| s.fail_sessions = fail);
    }

    // === Instrumentation ===

    /// Times `sql` was issued, including failed calls.
    pub fn calls(&self, sql: &str) -> usize {
        self.read(|s| s.calls.get(sql).copied().unwrap_or(0))
    }

    /// Total statements issued.
    pub fn total_calls(&self) -> usize {
        self.read(|s| s.calls.values().sum())
    }

    /// Sessions currently checked out.
    pub fn open_sessions(&self) -> usize {
        self.read(|s| s.open_sessions)
    }

    /// Sessions handed out since creation.
    pub fn sessions_opened(&self) -> usize {
        self.read(|s| s.sessions_opened)
    }

    pub fn recommendation_count(&self) -> usize {
        self.read(|s| s.recommendations.len())
    }

    pub fn recommendations(&self) -> Vec<RecommendationRecord> {
        self.read(|s| s.recommendations.clone())
    }

    // === Statement evaluation ===

    fn begin(&self, sql: &str) -> LecternResult<MutexGuard<'_, MockState>> {
        let mut state = self.state()?;
        *state.calls.entry(sql.to_string()).or_insert(0) += 1;
        if state.failing.contains(sql) {
            return Err(StorageError::QueryFailed {
                reason: "injected failure".to_string(),
            }
            .into());
        }
        Ok(state)
    }

    fn fetch(&self, sql: &str, params: &[SqlValue]) -> LecternResult<Vec<Row>> {
        let state = self.begin(sql)?;
        let first_text = || text_param(params, 0);

        let rows = match sql {
            queries::READER_BY_ID => {
                let reader_id = first_text()?;
                state
                    .readers
                    .get(reader_id)
                    .map(to_row)
                    .transpose()?
                    .into_iter()
                    .collect()
            }
            queries::BORROW_HISTORY => {
                let reader_id = first_text()?;
                let limit = int_param(params, 1)?;
                state.history_rows(reader_id, limit)
            }
            queries::READER_TOTALS => {
                let reader_id = first_text()?;
                let loans: Vec<&LoanRow> =
                    state.loans.iter().filter(|l| l.reader_id == reader_id).collect();
                let unique: HashSet<&str> = loans.iter().map(|l| l.book_id.as_str()).collect();
                vec![object(json!({
                    "total_records": loans.len(),
                    "unique_books": unique.len(),
                }))]
            }
            queries::READER_STATUS_COUNTS => {
                let reader_id = first_text()?;
                let mut counts: Vec<(String, usize)> = Vec::new();
                for loan in state.loans.iter().filter(|l| l.reader_id == reader_id) {
                    match counts.iter_mut().find(|(status, _)| *status == loan.status) {
                        Some((_, n)) => *n += 1,
                        None => counts.push((loan.status.clone(), 1)),
                    }
                }
                counts
                    .into_iter()
                    .map(|(status, count)| object(json!({"status": status, "count": count})))
                    .collect()
            }
            queries::RECOMMENDATION_HISTORY => {
                let reader_id = first_text()?;
                let limit = int_param(params, 1)?;
                let mut records: Vec<&RecommendationRecord> = state
                    .recommendations
                    .iter()
                    .filter(|r| r.reader_id == reader_id)
                    .collect();
                records.sort_by(|a, b| {
                    b.created_at
                        .cmp(&a.created_at)
                        .then(b.recommendation_id.cmp(&a.recommendation_id))
                });
                records
                    .into_iter()
                    .take(usize::try_from(limit).unwrap_or(0))
                    .map(to_row)
                    .collect::<LecternResult<_>>()?
            }
            s if s.starts_with("SELECT COUNT(*) AS count FROM books") => {
                vec![object(json!({"count": state.books.len()}))]
            }
            s if s.starts_with(&format!("SELECT {} FROM books", queries::BOOK_COLUMNS)) => {
                let offset = int_param(params, params.len().saturating_sub(1))?;
                let limit = int_param(params, params.len().saturating_sub(2))?;
                state
                    .books
                    .values()
                    .skip(usize::try_from(offset).unwrap_or(0))
                    .take(usize::try_from(limit).unwrap_or(0))
                    .map(to_row)
                    .collect::<LecternResult<_>>()?
            }
            other => return Err(unsupported(other)),
        };
        Ok(rows)
    }

    fn apply_insert(state: &mut MockState, sql: &str, params: &[SqlValue]) -> LecternResult<()> {
        if sql != queries::RECOMMENDATION_INSERT {
            return Err(unsupported(sql));
        }
        let reader_id = text_param(params, 0)?.to_string();
        let optional = |i: usize| params.get(i).and_then(SqlValue::as_text).map(str::to_string);
        let recommendation_id = i32::try_from(state.recommendations.len() + 1).unwrap_or(i32::MAX);
        state.recommendations.push(RecommendationRecord {
            recommendation_id,
            reader_id,
            model_used: optional(1),
            recommended_book_title: optional(2),
            recommended_book_author: optional(3),
            recommendation_reason: optional(4),
            created_at: Some(Utc::now()),
        });
        Ok(())
    }
}

impl MockState {
    fn history_rows(&self, reader_id: &str, limit: i64) -> Vec<Row> {
        let mut loans: Vec<&LoanRow> = self
            .loans
            .iter()
            .filter(|l| l.reader_id == reader_id)
            .collect();
        loans.sort_by(|a, b| {
            b.borrow_date
                .cmp(&a.borrow_date)
                .then(b.borrow_id.cmp(&a.borrow_id))
        });

        loans
            .into_iter()
            .filter_map(|loan| {
                let book = self.books.get(&loan.book_id)?;
                let reader = self.readers.get(&loan.reader_id)?;
                Some(object(json!({
                    "borrow_id": loan.borrow_id,
                    "reader_id": loan.reader_id,
                    "book_id": loan.book_id,
                    "borrow_date": loan.borrow_date,
                    "due_date": loan.due_date,
                    "return_date": loan.return_date,
                    "status": loan.status,
                    "book_title": book.title,
                    "call_no": book.call_no,
                    "author": book.author,
                    "publisher": book.publisher,
                    "publish_year": book.publication_year,
                    "reader_department": reader.department,
                    "reader_type": reader.reader_type,
                    "enroll_year": reader.enroll_year,
                })))
            })
            .take(usize::try_from(limit).unwrap_or(0))
            .collect()
    }
}

#[async_trait]
impl Datastore for InMemoryDatastore {
    async fn session(&self) -> LecternResult<Box<dyn DatastoreSession>> {
        let mut state = self.state()?;
        if state.fail_sessions {
            return Err(StorageError::ConnectionFailed {
                reason: "injected session failure".to_string(),
            }
            .into());
        }
        state.open_sessions += 1;
        state.sessions_opened += 1;
        drop(state);
        Ok(Box::new(InMemorySession {
            store: self.clone(),
        }))
    }
}

/// Session over an [`InMemoryDatastore`]; checked back in on drop.
pub struct InMemorySession {
    store: InMemoryDatastore,
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        self.store
            .write(|s| s.open_sessions = s.open_sessions.saturating_sub(1));
    }
}

#[async_trait]
impl DatastoreSession for InMemorySession {
    async fn fetch_all(&mut self, sql: &str, params: &[SqlValue]) -> LecternResult<Vec<Row>> {
        self.store.fetch(sql, params)
    }

    async fn fetch_optional(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> LecternResult<Option<Row>> {
        Ok(self.store.fetch(sql, params)?.into_iter().next())
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> LecternResult<u64> {
        let mut state = self.store.begin(sql)?;
        InMemoryDatastore::apply_insert(&mut state, sql, params)?;
        Ok(1)
    }

    async fn execute_batch(&mut self, sql: &str, params: &[Vec<SqlValue>]) -> LecternResult<u64> {
        let mut state = self.store.begin(sql).map_err(|e| match e {
            lectern_core::LecternError::Storage(StorageError::QueryFailed { reason }) => {
                StorageError::TransactionFailed { reason }.into()
            }
            other => other,
        })?;

        // Roll back rows applied before a failing one.
        let before = state.recommendations.len();
        for row in params {
            if let Err(e) = InMemoryDatastore::apply_insert(&mut state, sql, row) {
                state.recommendations.truncate(before);
                return Err(e);
            }
        }
        Ok(params.len() as u64)
    }
}

fn to_row<T: Serialize>(value: &T) -> LecternResult<Row> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(StorageError::DecodeFailed {
            target: "row".to_string(),
            reason: "value is not an object".to_string(),
        }
        .into()),
        Err(e) => Err(StorageError::DecodeFailed {
            target: "row".to_string(),
            reason: e.to_string(),
        }
        .into()),
    }
}

fn object(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

fn text_param(params: &[SqlValue], index: usize) -> LecternResult<&str> {
    params.get(index).and_then(SqlValue::as_text).ok_or_else(|| {
        StorageError::QueryFailed {
            reason: format!("expected text parameter ${}", index + 1),
        }
        .into()
    })
}

fn int_param(params: &[SqlValue], index: usize) -> LecternResult<i64> {
    params.get(index).and_then(SqlValue::as_i64).ok_or_else(|| {
        StorageError::QueryFailed {
            reason: format!("expected integer parameter ${}", index + 1),
        }
        .into()
    })
}

fn unsupported(sql: &str) -> lectern_core::LecternError {
    StorageError::UnsupportedStatement {
        statement: sql.chars().take(60).collect(),
    }
    .into()
}
