use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use futures_util::{TryStreamExt, pin_mut};
use tokio_postgres::{Client, Statement};
use tracing::trace;

use super::params::{as_refs, typed_params};
use super::query::buffer_rows;
use crate::config::QueryExecMode;
use crate::error::NeonPgError;
use crate::results::BufferedRows;
use crate::types::{CommandTag, RowValues};

/// Prepared statements kept on one connection, evicted oldest-first.
pub(crate) struct StatementCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    by_sql: HashMap<String, Statement>,
    order: VecDeque<String>,
}

impl StatementCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(CacheState::default()),
        }
    }

    fn get(&self, sql: &str) -> Option<Statement> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.by_sql.get(sql).cloned()
    }

    fn insert(&self, sql: &str, stmt: Statement) {
        if self.capacity == 0 {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.by_sql.contains_key(sql) {
            return;
        }
        while state.order.len() >= self.capacity {
            match state.order.pop_front() {
                Some(oldest) => {
                    state.by_sql.remove(&oldest);
                }
                None => break,
            }
        }
        state.order.push_back(sql.to_string());
        state.by_sql.insert(sql.to_string(), stmt);
    }

    pub(crate) fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }
}

/// One physical connection as held by the pool.
pub struct PgConn {
    client: Client,
    exec_mode: QueryExecMode,
    statements: StatementCache,
}

impl PgConn {
    pub(crate) fn new(client: Client, exec_mode: QueryExecMode, statement_cache_capacity: usize) -> Self {
        Self {
            client,
            exec_mode,
            statements: StatementCache::new(statement_cache_capacity),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    /// Run one or more statements over the simple query protocol.
    pub(crate) async fn batch_execute(&self, sql: &str) -> Result<(), NeonPgError> {
        self.client.batch_execute(sql).await?;
        Ok(())
    }

    pub(crate) async fn ping(&self) -> Result<(), NeonPgError> {
        self.validate().await?;
        Ok(())
    }

    pub(crate) async fn validate(&self) -> Result<(), tokio_postgres::Error> {
        self.client.simple_query("SELECT 1").await.map(|_| ())
    }

    async fn statement(&self, sql: &str) -> Result<Statement, NeonPgError> {
        if let Some(stmt) = self.statements.get(sql) {
            return Ok(stmt);
        }
        let stmt = self.client.prepare(sql).await?;
        self.statements.insert(sql, stmt.clone());
        trace!(cached = self.statements.len(), "prepared statement");
        Ok(stmt)
    }

    pub(crate) async fn exec(&self, sql: &str, args: &[RowValues]) -> Result<CommandTag, NeonPgError> {
        match self.exec_mode {
            QueryExecMode::CacheStatement => {
                let stmt = self.statement(sql).await?;
                let affected = self.client.execute(&stmt, &as_refs(args)).await?;
                Ok(CommandTag::new(affected))
            }
            QueryExecMode::Simple => {
                let stream = self.client.query_typed_raw(sql, typed_params(args)).await?;
                pin_mut!(stream);
                while stream.try_next().await?.is_some() {}
                Ok(CommandTag::new(stream.rows_affected().unwrap_or(0)))
            }
        }
    }

    pub(crate) async fn query(&self, sql: &str, args: &[RowValues]) -> Result<BufferedRows, NeonPgError> {
        match self.exec_mode {
            QueryExecMode::CacheStatement => {
                let stmt = self.statement(sql).await?;
                let rows = self.client.query(&stmt, &as_refs(args)).await?;
                let columns = stmt.columns().iter().map(|c| c.name().to_string()).collect();
                buffer_rows(Some(columns), &rows)
            }
            QueryExecMode::Simple => {
                let rows = self.client.query_typed(sql, &typed_params(args)).await?;
                buffer_rows(None, &rows)
            }
        }
    }
}
