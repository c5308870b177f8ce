//! The capability surface shared by the pooled driver and the test doubles.

use async_trait::async_trait;

use crate::error::NeonPgError;
use crate::results::{Row, Rows};
use crate::types::{CommandTag, RowValues, TxOptions};

/// What application code needs from a database handle.
///
/// Implemented by [`Pool`](crate::Pool) and, behind the `test-utils`
/// feature, by `TestDb`, so code written against `&dyn Db` runs unchanged
/// against either.
#[async_trait]
pub trait Db: Send + Sync {
    async fn exec(&self, sql: &str, args: &[RowValues]) -> Result<CommandTag, NeonPgError>;

    /// Run a query and buffer its rows. Close the cursor on every path.
    async fn query(&self, sql: &str, args: &[RowValues]) -> Result<Box<dyn Rows>, NeonPgError>;

    /// Run a query expected to return at most one row. Errors surface from
    /// [`Row::scan`].
    async fn query_row(&self, sql: &str, args: &[RowValues]) -> Box<dyn Row>;

    async fn begin(&self) -> Result<Box<dyn Tx>, NeonPgError> {
        self.begin_tx(TxOptions::default()).await
    }

    async fn begin_tx(&self, opts: TxOptions) -> Result<Box<dyn Tx>, NeonPgError>;

    async fn ping(&self) -> Result<(), NeonPgError>;

    /// Release every resource. Idempotent.
    fn close(&self);
}

/// An open transaction.
///
/// `commit` and `rollback` finish the transaction; afterwards every method
/// returns [`NeonPgError::TxClosed`].
#[async_trait]
pub trait Tx: Send + Sync {
    async fn exec(&self, sql: &str, args: &[RowValues]) -> Result<CommandTag, NeonPgError>;

    async fn query(&self, sql: &str, args: &[RowValues]) -> Result<Box<dyn Rows>, NeonPgError>;

    async fn query_row(&self, sql: &str, args: &[RowValues]) -> Box<dyn Row>;

    async fn commit(&self) -> Result<(), NeonPgError>;

    async fn rollback(&self) -> Result<(), NeonPgError>;
}

/// Connection counts reported by a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct PoolStats {
    pub connections: u32,
    pub idle_connections: u32,
}

/// A driver-level pool: the [`Db`] surface plus statistics.
pub trait DriverPool: Db {
    fn stats(&self) -> PoolStats;
}
