use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bb8::PooledConnection;
use tokio::runtime::Handle;
use tracing::debug;

use super::manager::PgManager;
use crate::db::Tx;
use crate::error::NeonPgError;
use crate::results::{BufferedRow, Row, Rows};
use crate::types::{CommandTag, RowValues, TxOptions};

/// A transaction pinned to one checked-out connection.
///
/// Dropping it before `commit` or `rollback` succeeds spawns a `ROLLBACK`
/// on the current runtime; the connection returns to the pool afterwards.
pub struct PgTx {
    conn: Option<PooledConnection<'static, PgManager>>,
    finished: AtomicBool,
}

impl PgTx {
    /// Begin a transaction on `conn`.
    ///
    /// # Errors
    /// Returns the driver error if `BEGIN` fails; the connection goes back
    /// to the pool.
    pub async fn begin(
        conn: PooledConnection<'static, PgManager>,
        opts: TxOptions,
    ) -> Result<Self, NeonPgError> {
        conn.batch_execute(&opts.begin_sql()).await?;
        Ok(Self {
            conn: Some(conn),
            finished: AtomicBool::new(false),
        })
    }

    fn live(&self) -> Result<&PooledConnection<'static, PgManager>, NeonPgError> {
        if self.finished.load(Ordering::Acquire) {
            return Err(NeonPgError::TxClosed);
        }
        self.conn.as_ref().ok_or(NeonPgError::TxClosed)
    }
}

#[async_trait]
impl Tx for PgTx {
    async fn exec(&self, sql: &str, args: &[RowValues]) -> Result<CommandTag, NeonPgError> {
        self.live()?.exec(sql, args).await
    }

    async fn query(&self, sql: &str, args: &[RowValues]) -> Result<Box<dyn Rows>, NeonPgError> {
        let rows = self.live()?.query(sql, args).await?;
        Ok(Box::new(rows))
    }

    async fn query_row(&self, sql: &str, args: &[RowValues]) -> Box<dyn Row> {
        let row = match self.live() {
            Ok(conn) => match conn.query(sql, args).await {
                Ok(mut rows) => BufferedRow::first_of(&mut rows),
                Err(err) => BufferedRow::from_error(err),
            },
            Err(err) => BufferedRow::from_error(err),
        };
        Box::new(row)
    }

    async fn commit(&self) -> Result<(), NeonPgError> {
        // On failure the transaction stays open so a rollback can follow.
        self.live()?.batch_execute("COMMIT").await?;
        self.finished.store(true, Ordering::Release);
        Ok(())
    }

    async fn rollback(&self) -> Result<(), NeonPgError> {
        let conn = self.live()?;
        let result = conn.batch_execute("ROLLBACK").await;
        self.finished.store(true, Ordering::Release);
        result
    }
}

impl Drop for PgTx {
    fn drop(&mut self) {
        if !self.finished.load(Ordering::Acquire)
            && let Some(conn) = self.conn.take()
            && let Ok(handle) = Handle::try_current()
        {
            debug!("transaction dropped while open; rolling back");
            handle.spawn(async move {
                let _ = conn.batch_execute("ROLLBACK").await;
            });
        }
    }
}
