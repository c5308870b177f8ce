use async_trait::async_trait;

use crate::config::PoolConfig;
use crate::db::{Db, DriverPool, PoolStats, Tx};
use crate::error::{BoxError, NeonPgError};
use crate::results::{Row, Rows};
use crate::types::{CommandTag, RowValues, TxOptions};

/// Builds the driver pool from a resolved configuration.
///
/// [`connect`](crate::connect) uses [`Bb8Factory`](crate::postgres::Bb8Factory)
/// unless a [`Connector`](crate::Connector) supplies another one, which is
/// how tests inject construction failures or capture the final configuration.
#[async_trait]
pub trait PoolFactory: Send + Sync {
    async fn build(&self, config: PoolConfig) -> Result<Box<dyn DriverPool>, BoxError>;
}

/// A connected pool plus the URL for session-level work.
///
/// The driver pool is owned, not exposed: only the [`Db`] surface,
/// [`Pool::stats`] and [`Pool::direct_url`] are reachable. After
/// [`Db::close`] every operation fails with [`NeonPgError::PoolClosed`].
pub struct Pool {
    inner: Box<dyn DriverPool>,
    direct_url: String,
}

impl Pool {
    pub(crate) fn new(inner: Box<dyn DriverPool>, direct_url: String) -> Self {
        Self { inner, direct_url }
    }

    /// The connection string for migrations, LISTEN/NOTIFY, advisory locks
    /// and anything else that needs a real session. Never a pooled endpoint
    /// unless it was supplied explicitly. Contains credentials.
    #[must_use]
    pub fn direct_url(&self) -> &str {
        &self.direct_url
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.inner.stats()
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("stats", &self.stats())
            .field("direct_url", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl Db for Pool {
    async fn exec(&self, sql: &str, args: &[RowValues]) -> Result<CommandTag, NeonPgError> {
        self.inner.exec(sql, args).await
    }

    async fn query(&self, sql: &str, args: &[RowValues]) -> Result<Box<dyn Rows>, NeonPgError> {
        self.inner.query(sql, args).await
    }

    async fn query_row(&self, sql: &str, args: &[RowValues]) -> Box<dyn Row> {
        self.inner.query_row(sql, args).await
    }

    async fn begin_tx(&self, opts: TxOptions) -> Result<Box<dyn Tx>, NeonPgError> {
        self.inner.begin_tx(opts).await
    }

    async fn ping(&self) -> Result<(), NeonPgError> {
        self.inner.ping().await
    }

    fn close(&self) {
        self.inner.close();
    }
}
