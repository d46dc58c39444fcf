//! PostgreSQL Datastore
//!
//! Connection pooling with deadpool-postgres and a [`Datastore`]
//! implementation over it. Each session holds one pooled connection and
//! returns it to the pool when dropped. Rows come back as JSON maps keyed by
//! column name so the query layer can decode them without knowing about
//! PostgreSQL types.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts};
use lectern_core::{LecternError, LecternResult, StorageError};
use lectern_storage::{Datastore, DatastoreSession, Row, SqlValue};
use serde_json::Value;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::NoTls;

use crate::config::env_lookup;
use crate::error::{ApiError, ApiResult};
use crate::telemetry::METRICS;

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

#[derive(Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Applies to waiting for, creating and recycling a connection.
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "library".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("max_size", &self.max_size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl DbConfig {
    /// Reads `LECTERN_DB_HOST`, `LECTERN_DB_PORT`, `LECTERN_DB_NAME`,
    /// `LECTERN_DB_USER`, `LECTERN_DB_PASSWORD`, `LECTERN_DB_POOL_SIZE` and
    /// `LECTERN_DB_TIMEOUT` (seconds).
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("LECTERN_DB_HOST").unwrap_or(defaults.host),
            port: lookup("LECTERN_DB_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: lookup("LECTERN_DB_NAME").unwrap_or(defaults.dbname),
            user: lookup("LECTERN_DB_USER").unwrap_or(defaults.user),
            password: lookup("LECTERN_DB_PASSWORD").unwrap_or_default(),
            max_size: lookup("LECTERN_DB_POOL_SIZE")
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_size),
            timeout: lookup("LECTERN_DB_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool = PoolConfig::new(self.max_size);
        pool.timeouts = Timeouts {
            wait: Some(self.timeout),
            create: Some(self.timeout),
            recycle: Some(self.timeout),
        };
        cfg.pool = Some(pool);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))
    }
}

// ============================================================================
// DATASTORE
// ============================================================================

/// [`Datastore`] over a deadpool-postgres pool.
#[derive(Clone)]
pub struct PgDatastore {
    pool: Pool,
}

impl PgDatastore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Connections currently held by the pool.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }
}

#[async_trait]
impl Datastore for PgDatastore {
    async fn session(&self) -> LecternResult<Box<dyn DatastoreSession>> {
        let client = self.pool.get().await.map_err(|e| StorageError::ConnectionFailed {
            reason: e.to_string(),
        })?;
        Ok(Box::new(PgSession { client }))
    }
}

/// One pooled connection. Dropping it returns the connection to the pool.
pub struct PgSession {
    client: deadpool_postgres::Object,
}

impl PgSession {
    async fn prepare(&self, sql: &str) -> LecternResult<tokio_postgres::Statement> {
        self.client
            .prepare_cached(sql)
            .await
            .map_err(|e| classify(e, |reason| StorageError::QueryFailed { reason }))
    }

    async fn query_rows(&self, sql: &str, params: &[SqlValue]) -> LecternResult<Vec<Row>> {
        let stmt = self.prepare(sql).await?;
        let bound = bind_all(params, stmt.params())?;
        let rows = self
            .client
            .query(&stmt, &as_refs(&bound))
            .await
            .map_err(|e| classify(e, |reason| StorageError::QueryFailed { reason }))?;
        rows.iter().map(decode).collect()
    }

    async fn write(&self, sql: &str, params: &[SqlValue]) -> LecternResult<u64> {
        let stmt = self.prepare(sql).await?;
        let bound = bind_all(params, stmt.params())?;
        self.client
            .execute(&stmt, &as_refs(&bound))
            .await
            .map_err(|e| classify(e, |reason| StorageError::WriteFailed { reason }))
    }

    async fn write_all(&mut self, sql: &str, params: &[Vec<SqlValue>]) -> LecternResult<u64> {
        let tx = self
            .client
            .transaction()
            .await
            .map_err(|e| classify(e, |reason| StorageError::TransactionFailed { reason }))?;
        let stmt = tx
            .prepare_cached(sql)
            .await
            .map_err(|e| classify(e, |reason| StorageError::QueryFailed { reason }))?;

        let mut affected = 0;
        for row in params {
            let bound = bind_all(row, stmt.params())?;
            // Dropping `tx` on error rolls the whole batch back.
            affected += tx
                .execute(&stmt, &as_refs(&bound))
                .await
                .map_err(|e| classify(e, |reason| StorageError::WriteFailed { reason }))?;
        }

        tx.commit()
            .await
            .map_err(|e| classify(e, |reason| StorageError::TransactionFailed { reason }))?;
        Ok(affected)
    }
}

#[async_trait]
impl DatastoreSession for PgSession {
    async fn fetch_all(&mut self, sql: &str, params: &[SqlValue]) -> LecternResult<Vec<Row>> {
        let start = Instant::now();
        let result = self.query_rows(sql, params).await;
        record("fetch", sql, result.is_ok(), start);
        result
    }

    async fn fetch_optional(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> LecternResult<Option<Row>> {
        Ok(self.fetch_all(sql, params).await?.into_iter().next())
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> LecternResult<u64> {
        let start = Instant::now();
        let result = self.write(sql, params).await;
        record("execute", sql, result.is_ok(), start);
        result
    }

    async fn execute_batch(&mut self, sql: &str, params: &[Vec<SqlValue>]) -> LecternResult<u64> {
        let start = Instant::now();
        let result = self.write_all(sql, params).await;
        record("batch", sql, result.is_ok(), start);
        result
    }
}

// ============================================================================
// PARAMETER BINDING
// ============================================================================

type Bound = Box<dyn ToSql + Sync + Send>;

fn bind_all(values: &[SqlValue], types: &[Type]) -> LecternResult<Vec<Bound>> {
    if values.len() != types.len() {
        return Err(StorageError::QueryFailed {
            reason: format!(
                "statement expects {} parameters, got {}",
                types.len(),
                values.len()
            ),
        }
        .into());
    }
    values.iter().zip(types).map(|(v, ty)| bind(v, ty)).collect()
}

fn as_refs(bound: &[Bound]) -> Vec<&(dyn ToSql + Sync)> {
    bound.iter().map(|b| b.as_ref() as &(dyn ToSql + Sync)).collect()
}

/// Bind a value as the type the server inferred for its placeholder.
fn bind(value: &SqlValue, ty: &Type) -> LecternResult<Bound> {
    match value {
        SqlValue::Text(s) => Ok(Box::new(s.clone())),
        SqlValue::Int(v) => integer(i64::from(*v), ty),
        SqlValue::BigInt(v) => integer(*v, ty),
        SqlValue::Null => Ok(null_of(ty)),
    }
}

fn integer(value: i64, ty: &Type) -> LecternResult<Bound> {
    let out_of_range = || -> LecternError {
        StorageError::QueryFailed {
            reason: format!("{} does not fit parameter type {}", value, ty),
        }
        .into()
    };
    if *ty == Type::INT2 {
        i16::try_from(value)
            .map(|v| Box::new(v) as Bound)
            .map_err(|_| out_of_range())
    } else if *ty == Type::INT4 {
        i32::try_from(value)
            .map(|v| Box::new(v) as Bound)
            .map_err(|_| out_of_range())
    } else {
        Ok(Box::new(value))
    }
}

fn null_of(ty: &Type) -> Bound {
    if *ty == Type::INT2 {
        Box::new(None::<i16>)
    } else if *ty == Type::INT4 {
        Box::new(None::<i32>)
    } else if *ty == Type::INT8 {
        Box::new(None::<i64>)
    } else if *ty == Type::BOOL {
        Box::new(None::<bool>)
    } else if *ty == Type::DATE {
        Box::new(None::<NaiveDate>)
    } else if *ty == Type::TIMESTAMPTZ {
        Box::new(None::<DateTime<Utc>>)
    } else {
        Box::new(None::<String>)
    }
}

// ============================================================================
// ROW DECODING
// ============================================================================

fn decode(row: &tokio_postgres::Row) -> LecternResult<Row> {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = column_value(row, idx, column.type_()).map_err(|e| {
            StorageError::DecodeFailed {
                target: column.name().to_string(),
                reason: e.to_string(),
            }
        })?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

/// Dates become `YYYY-MM-DD`, timestamps RFC 3339, NULL becomes `null`.
fn column_value(
    row: &tokio_postgres::Row,
    idx: usize,
    ty: &Type,
) -> Result<Value, tokio_postgres::Error> {
    let value = if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?.map(Value::from)
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?.map(Value::from)
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(Value::from)
    } else if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?.map(Value::from)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?.map(|v| Value::from(f64::from(v)))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(Value::from)
    } else if *ty == Type::DATE {
        row.try_get::<_, Option<NaiveDate>>(idx)?
            .map(|d| Value::String(d.to_string()))
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|t| Value::String(t.to_rfc3339()))
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|t| Value::String(t.and_utc().to_rfc3339()))
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        row.try_get::<_, Option<Value>>(idx)?
    } else {
        row.try_get::<_, Option<String>>(idx)?.map(Value::String)
    };
    Ok(value.unwrap_or(Value::Null))
}

// ============================================================================
// HELPERS
// ============================================================================

/// A closed connection is a connection failure whatever the operation was.
fn classify(err: tokio_postgres::Error, kind: impl FnOnce(String) -> StorageError) -> LecternError {
    if err.is_closed() {
        StorageError::ConnectionFailed {
            reason: err.to_string(),
        }
        .into()
    } else {
        kind(err.to_string()).into()
    }
}

fn record(operation: &str, sql: &str, success: bool, start: Instant) {
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_db_operation(
            operation,
            statement_kind(sql),
            success,
            start.elapsed().as_secs_f64(),
        );
    }
}

/// Leading keyword, lowercased: `select`, `insert`, ...
fn statement_kind(sql: &str) -> &'static str {
    let head = sql.trim_start().split_whitespace().next().unwrap_or_default();
    ["select", "insert", "update", "delete", "with"]
        .into_iter()
        .find(|kw| head.eq_ignore_ascii_case(kw))
        .unwrap_or("other")
}
