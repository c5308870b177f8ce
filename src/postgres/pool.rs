use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use bb8::PooledConnection;
use tracing::{debug, info};

use super::manager::PgManager;
use super::transaction::PgTx;
use crate::config::PoolConfig;
use crate::db::{Db, DriverPool, PoolStats, Tx};
use crate::error::{BoxError, NeonPgError};
use crate::pool::PoolFactory;
use crate::results::{BufferedRow, Row, Rows};
use crate::types::{CommandTag, RowValues, TxOptions};

/// A bb8 pool of TLS Postgres connections.
pub struct PgPool {
    pool: RwLock<Option<bb8::Pool<PgManager>>>,
    host: String,
}

impl PgPool {
    /// Build the pool. No connection is opened unless `min_idle` asks for one.
    ///
    /// # Errors
    /// Returns an error for sizes bb8 cannot honor, an unusable TLS setup,
    /// or a failure while opening the initial idle connections.
    pub async fn build(config: PoolConfig) -> Result<Self, BoxError> {
        if config.max_size == 0 {
            return Err("max_size must be greater than zero".into());
        }
        if config.min_idle > config.max_size {
            return Err("min_idle must not exceed max_size".into());
        }
        let connect_timeout = config.connect_timeout();
        if connect_timeout.is_zero() {
            return Err("connect timeout must be greater than zero".into());
        }
        if config.max_lifetime.is_zero() {
            return Err("max_lifetime must be greater than zero".into());
        }
        if config.max_idle_time.is_zero() {
            return Err("max_idle_time must be greater than zero".into());
        }
        if config.health_check_period.is_some_and(|p| p.is_zero()) {
            return Err("health_check_period must be greater than zero".into());
        }

        let host = config.conn.host();
        let tls = config.conn.tls.connector()?;
        let manager = PgManager::new(config.conn, tls);

        let mut builder = bb8::Pool::builder()
            .max_size(config.max_size)
            .min_idle((config.min_idle > 0).then_some(config.min_idle))
            .max_lifetime(Some(config.max_lifetime))
            .idle_timeout(Some(config.max_idle_time))
            .connection_timeout(connect_timeout)
            .test_on_check_out(config.health_check_period.is_some());
        if let Some(period) = config.health_check_period {
            builder = builder.reaper_rate(period);
        }

        let pool = builder.build(manager).await?;
        debug!(host = %host, max_size = config.max_size, "pool built");
        Ok(Self {
            pool: RwLock::new(Some(pool)),
            host,
        })
    }

    fn current(&self) -> Result<bb8::Pool<PgManager>, NeonPgError> {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(NeonPgError::PoolClosed)
    }

    async fn conn(&self) -> Result<PooledConnection<'static, PgManager>, NeonPgError> {
        Ok(self.current()?.get_owned().await?)
    }
}

#[async_trait]
impl Db for PgPool {
    async fn exec(&self, sql: &str, args: &[RowValues]) -> Result<CommandTag, NeonPgError> {
        self.conn().await?.exec(sql, args).await
    }

    async fn query(&self, sql: &str, args: &[RowValues]) -> Result<Box<dyn Rows>, NeonPgError> {
        let rows = self.conn().await?.query(sql, args).await?;
        Ok(Box::new(rows))
    }

    async fn query_row(&self, sql: &str, args: &[RowValues]) -> Box<dyn Row> {
        let row = match self.query(sql, args).await {
            Ok(mut rows) => BufferedRow::first_of(rows.as_mut()),
            Err(err) => BufferedRow::from_error(err),
        };
        Box::new(row)
    }

    async fn begin_tx(&self, opts: TxOptions) -> Result<Box<dyn Tx>, NeonPgError> {
        let conn = self.conn().await?;
        Ok(Box::new(PgTx::begin(conn, opts).await?))
    }

    async fn ping(&self) -> Result<(), NeonPgError> {
        self.conn().await?.ping().await
    }

    fn close(&self) {
        let taken = self
            .pool
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if taken.is_some() {
            info!(host = %self.host, "pool closed");
        }
    }
}

impl DriverPool for PgPool {
    fn stats(&self) -> PoolStats {
        self.current().map_or_else(
            |_| PoolStats::default(),
            |pool| {
                let state = pool.state();
                PoolStats {
                    connections: state.connections,
                    idle_connections: state.idle_connections,
                }
            },
        )
    }
}

/// The default [`PoolFactory`]: a bb8 pool of [`PgManager`] connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bb8Factory;

#[async_trait]
impl PoolFactory for Bb8Factory {
    async fn build(&self, config: PoolConfig) -> Result<Box<dyn DriverPool>, BoxError> {
        Ok(Box::new(PgPool::build(config).await?))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    const URL: &str = "postgresql://u:p@127.0.0.1:1/db?sslmode=require";

    async fn build_error(customize: impl FnOnce(&mut PoolConfig)) -> String {
        let mut cfg = PoolConfig::parse(URL).unwrap();
        customize(&mut cfg);
        match PgPool::build(cfg).await {
            Ok(_) => panic!("pool should not have been built"),
            Err(err) => err.to_string(),
        }
    }

    #[tokio::test]
    async fn sizes_bb8_would_assert_on_are_errors() {
        assert!(build_error(|c| c.max_size = 0).await.contains("max_size"));
        assert!(
            build_error(|c| {
                c.max_size = 2;
                c.min_idle = 3;
            })
            .await
            .contains("min_idle")
        );
    }

    #[tokio::test]
    async fn zero_lifecycle_durations_are_errors() {
        assert!(
            build_error(|c| c.max_lifetime = Duration::ZERO)
                .await
                .contains("max_lifetime")
        );
        assert!(
            build_error(|c| c.max_idle_time = Duration::ZERO)
                .await
                .contains("max_idle_time")
        );
        assert!(
            build_error(|c| c.health_check_period = Some(Duration::ZERO))
                .await
                .contains("health_check_period")
        );
        assert!(
            build_error(|c| {
                c.conn.pg.connect_timeout(Duration::ZERO);
            })
            .await
            .contains("connect timeout")
        );
    }
}
