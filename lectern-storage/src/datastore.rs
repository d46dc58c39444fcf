//! Strict datastore abstraction.
//!
//! A [`Datastore`] hands out sessions; each session owns one connection for
//! the duration of a unit of work and gives it back when dropped, whichever
//! way the unit of work ends. Every method here returns errors as-is. The
//! degrading behaviour lives one level up, in [`crate::gateway`].

use async_trait::async_trait;
use lectern_core::{LecternResult, StorageError};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// One result row: column name to value, in select-list order.
pub type Row = Map<String, Value>;

/// Positional statement parameter (`$1`, `$2`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Text(String),
    Int(i32),
    BigInt(i64),
    Null,
}

impl SqlValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(i64::from(*v)),
            SqlValue::BigInt(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::BigInt(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Source of datastore sessions.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Acquire a session. Fails when no connection can be obtained.
    async fn session(&self) -> LecternResult<Box<dyn DatastoreSession>>;
}

/// A connection-scoped session.
#[async_trait]
pub trait DatastoreSession: Send {
    /// Run a read and return every row.
    async fn fetch_all(&mut self, sql: &str, params: &[SqlValue]) -> LecternResult<Vec<Row>>;

    /// Run a read and return the first row, if any.
    async fn fetch_optional(&mut self, sql: &str, params: &[SqlValue])
        -> LecternResult<Option<Row>>;

    /// Run a single write, committed on success. Returns the affected row count.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> LecternResult<u64>;

    /// Run one write per parameter set inside a single transaction.
    /// Either every write is committed or none is.
    async fn execute_batch(&mut self, sql: &str, params: &[Vec<SqlValue>]) -> LecternResult<u64>;
}

/// Decode a row into a typed value.
pub fn decode_row<T: DeserializeOwned>(row: Row, target: &str) -> LecternResult<T> {
    serde_json::from_value(Value::Object(row)).map_err(|e| {
        StorageError::DecodeFailed {
            target: target.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Decode every row, failing on the first bad one.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>, target: &str) -> LecternResult<Vec<T>> {
    rows.into_iter().map(|row| decode_row(row, target)).collect()
}
