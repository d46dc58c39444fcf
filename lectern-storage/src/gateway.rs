//! Datastore gateway.
//!
//! Wraps a strict [`Datastore`] with a [`DatastorePolicy`]. Under
//! `Degrade` a failed read becomes an empty or absent result and a failed
//! write becomes `false`, after the failure is logged. Under `Surface`
//! failures are returned to the caller. Failing to obtain a session is
//! returned under both policies.

use std::fmt;
use std::sync::Arc;

use lectern_core::{DatastorePolicy, LecternError, LecternResult};

use crate::datastore::{Datastore, DatastoreSession, Row, SqlValue};

#[derive(Clone)]
pub struct Gateway {
    store: Arc<dyn Datastore>,
    policy: DatastorePolicy,
}

impl Gateway {
    pub fn new(store: Arc<dyn Datastore>, policy: DatastorePolicy) -> Self {
        Self { store, policy }
    }

    /// Gateway with the compatible `Degrade` policy.
    pub fn degrading(store: Arc<dyn Datastore>) -> Self {
        Self::new(store, DatastorePolicy::Degrade)
    }

    pub fn policy(&self) -> DatastorePolicy {
        self.policy
    }

    /// Open a session for one unit of work. The connection goes back to
    /// the pool when the returned value is dropped.
    pub async fn session(&self) -> LecternResult<GatewaySession> {
        let inner = self.store.session().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to acquire datastore session");
            e
        })?;
        Ok(GatewaySession {
            inner,
            policy: self.policy,
        })
    }
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// A gateway-scoped session.
pub struct GatewaySession {
    inner: Box<dyn DatastoreSession>,
    policy: DatastorePolicy,
}

impl GatewaySession {
    /// Rows matching the statement; empty when nothing matches.
    pub async fn query_many(&mut self, sql: &str, params: &[SqlValue]) -> LecternResult<Vec<Row>> {
        let result = self.inner.fetch_all(sql, params).await;
        self.settle(result, Vec::new, sql)
    }

    /// First matching row, if any.
    pub async fn query_one(&mut self, sql: &str, params: &[SqlValue]) -> LecternResult<Option<Row>> {
        let result = self.inner.fetch_optional(sql, params).await;
        self.settle(result, || None, sql)
    }

    /// Single committed write. `true` on success.
    pub async fn insert(&mut self, sql: &str, params: &[SqlValue]) -> LecternResult<bool> {
        let result = self.inner.execute(sql, params).await.map(|_| true);
        self.settle(result, || false, sql)
    }

    /// All-or-nothing batch write. `true` when every row was committed.
    pub async fn batch_insert(
        &mut self,
        sql: &str,
        params: &[Vec<SqlValue>],
    ) -> LecternResult<bool> {
        if params.is_empty() {
            return Ok(true);
        }
        let result = self.inner.execute_batch(sql, params).await.map(|_| true);
        self.settle(result, || false, sql)
    }

    fn settle<T>(
        &self,
        result: LecternResult<T>,
        fallback: impl FnOnce() -> T,
        sql: &str,
    ) -> LecternResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => self.handle_failure(err, sql).map(|()| fallback()),
        }
    }

    fn handle_failure(&self, err: LecternError, sql: &str) -> LecternResult<()> {
        match self.policy {
            DatastorePolicy::Degrade => {
                tracing::error!(error = %err, statement = %statement_head(sql), "Datastore operation failed, degrading");
                Ok(())
            }
            DatastorePolicy::Surface => {
                tracing::warn!(error = %err, statement = %statement_head(sql), "Datastore operation failed");
                Err(err)
            }
        }
    }
}

/// First line of a statement, for log fields.
fn statement_head(sql: &str) -> &str {
    sql.trim().lines().next().unwrap_or_default()
}
