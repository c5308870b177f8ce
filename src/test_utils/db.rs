use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::rows::ErrRow;
use crate::db::{Db, DriverPool, PoolStats, Tx};
use crate::error::NeonPgError;
use crate::results::{Row, Rows};
use crate::types::{CommandTag, RowValues, TxOptions};

type ExecFn = Box<dyn Fn(&str, &[RowValues]) -> Result<CommandTag, NeonPgError> + Send + Sync>;
type QueryFn = Box<dyn Fn(&str, &[RowValues]) -> Result<Box<dyn Rows>, NeonPgError> + Send + Sync>;
type QueryRowFn = Box<dyn Fn(&str, &[RowValues]) -> Box<dyn Row> + Send + Sync>;
type BeginFn = Box<dyn Fn() -> Result<Box<dyn Tx>, NeonPgError> + Send + Sync>;
type BeginTxFn = Box<dyn Fn(TxOptions) -> Result<Box<dyn Tx>, NeonPgError> + Send + Sync>;
type PingFn = Box<dyn Fn() -> Result<(), NeonPgError> + Send + Sync>;
type CloseFn = Box<dyn Fn() + Send + Sync>;

/// A [`Db`] whose every method is a caller-supplied handler.
///
/// Methods without a handler fail with [`NeonPgError::NotMocked`], except
/// `ping`, which succeeds, and `close`, which does nothing.
#[derive(Default)]
pub struct TestDb {
    exec: Option<ExecFn>,
    query: Option<QueryFn>,
    query_row: Option<QueryRowFn>,
    begin: Option<BeginFn>,
    begin_tx: Option<BeginTxFn>,
    ping: Option<PingFn>,
    close: Option<CloseFn>,
}

impl TestDb {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_exec(
        mut self,
        f: impl Fn(&str, &[RowValues]) -> Result<CommandTag, NeonPgError> + Send + Sync + 'static,
    ) -> Self {
        self.exec = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_query(
        mut self,
        f: impl Fn(&str, &[RowValues]) -> Result<Box<dyn Rows>, NeonPgError> + Send + Sync + 'static,
    ) -> Self {
        self.query = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_query_row(
        mut self,
        f: impl Fn(&str, &[RowValues]) -> Box<dyn Row> + Send + Sync + 'static,
    ) -> Self {
        self.query_row = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_begin(
        mut self,
        f: impl Fn() -> Result<Box<dyn Tx>, NeonPgError> + Send + Sync + 'static,
    ) -> Self {
        self.begin = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_begin_tx(
        mut self,
        f: impl Fn(TxOptions) -> Result<Box<dyn Tx>, NeonPgError> + Send + Sync + 'static,
    ) -> Self {
        self.begin_tx = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_ping(mut self, f: impl Fn() -> Result<(), NeonPgError> + Send + Sync + 'static) -> Self {
        self.ping = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn on_close(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.close = Some(Box::new(f));
        self
    }
}

#[async_trait]
impl Db for TestDb {
    async fn exec(&self, sql: &str, args: &[RowValues]) -> Result<CommandTag, NeonPgError> {
        match &self.exec {
            Some(f) => f(sql, args),
            None => Err(NeonPgError::NotMocked),
        }
    }

    async fn query(&self, sql: &str, args: &[RowValues]) -> Result<Box<dyn Rows>, NeonPgError> {
        match &self.query {
            Some(f) => f(sql, args),
            None => Err(NeonPgError::NotMocked),
        }
    }

    async fn query_row(&self, sql: &str, args: &[RowValues]) -> Box<dyn Row> {
        match &self.query_row {
            Some(f) => f(sql, args),
            None => Box::new(ErrRow(NeonPgError::NotMocked)),
        }
    }

    async fn begin(&self) -> Result<Box<dyn Tx>, NeonPgError> {
        match &self.begin {
            Some(f) => f(),
            None => Err(NeonPgError::NotMocked),
        }
    }

    async fn begin_tx(&self, opts: TxOptions) -> Result<Box<dyn Tx>, NeonPgError> {
        match &self.begin_tx {
            Some(f) => f(opts),
            None => Err(NeonPgError::NotMocked),
        }
    }

    async fn ping(&self) -> Result<(), NeonPgError> {
        match &self.ping {
            Some(f) => f(),
            None => Ok(()),
        }
    }

    fn close(&self) {
        if let Some(f) = &self.close {
            f();
        }
    }
}

/// Lets a `TestDb` stand in for the driver pool behind a custom
/// [`PoolFactory`](crate::PoolFactory).
impl DriverPool for TestDb {
    fn stats(&self) -> PoolStats {
        PoolStats::default()
    }
}

#[derive(Default)]
struct Calls {
    commit: AtomicUsize,
    rollback: AtomicUsize,
}

/// A [`Tx`] that counts `commit` and `rollback` calls.
///
/// Clones share their counters, so a test can hand one clone to a
/// `TestDb::on_begin_tx` handler and keep another for assertions.
/// Statements are forwarded to an optional [`TestDb`].
#[derive(Clone, Default)]
pub struct TestTx {
    calls: Arc<Calls>,
    commit_error: Option<NeonPgError>,
    rollback_error: Option<NeonPgError>,
    rollback_delay: Option<Duration>,
    db: Option<Arc<TestDb>>,
}

impl TestTx {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_commit_error(mut self, err: NeonPgError) -> Self {
        self.commit_error = Some(err);
        self
    }

    #[must_use]
    pub fn with_rollback_error(mut self, err: NeonPgError) -> Self {
        self.rollback_error = Some(err);
        self
    }

    /// Make `rollback` sleep before it returns.
    #[must_use]
    pub fn with_rollback_delay(mut self, delay: Duration) -> Self {
        self.rollback_delay = Some(delay);
        self
    }

    /// Forward `exec`, `query` and `query_row` to `db`.
    #[must_use]
    pub fn with_db(mut self, db: Arc<TestDb>) -> Self {
        self.db = Some(db);
        self
    }

    #[must_use]
    pub fn commit_calls(&self) -> usize {
        self.calls.commit.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn rollback_calls(&self) -> usize {
        self.calls.rollback.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tx for TestTx {
    async fn exec(&self, sql: &str, args: &[RowValues]) -> Result<CommandTag, NeonPgError> {
        match &self.db {
            Some(db) => db.exec(sql, args).await,
            None => Err(NeonPgError::NotMocked),
        }
    }

    async fn query(&self, sql: &str, args: &[RowValues]) -> Result<Box<dyn Rows>, NeonPgError> {
        match &self.db {
            Some(db) => db.query(sql, args).await,
            None => Err(NeonPgError::NotMocked),
        }
    }

    async fn query_row(&self, sql: &str, args: &[RowValues]) -> Box<dyn Row> {
        match &self.db {
            Some(db) => db.query_row(sql, args).await,
            None => Box::new(ErrRow(NeonPgError::NotMocked)),
        }
    }

    async fn commit(&self) -> Result<(), NeonPgError> {
        self.calls.commit.fetch_add(1, Ordering::SeqCst);
        match &self.commit_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn rollback(&self) -> Result<(), NeonPgError> {
        self.calls.rollback.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.rollback_delay {
            tokio::time::sleep(delay).await;
        }
        match &self.rollback_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RowsBuilder, new_row};

    #[tokio::test]
    async fn unmocked_methods_fail_except_ping_and_close() {
        let db = TestDb::new();
        assert!(matches!(db.exec("SELECT 1", &[]).await, Err(NeonPgError::NotMocked)));
        assert!(matches!(db.query("SELECT 1", &[]).await, Err(NeonPgError::NotMocked)));
        assert!(matches!(db.begin().await, Err(NeonPgError::NotMocked)));
        assert!(matches!(
            db.begin_tx(TxOptions::default()).await,
            Err(NeonPgError::NotMocked)
        ));
        let mut id = 0i64;
        let row = db.query_row("SELECT 1", &[]).await;
        assert!(matches!(row.scan(&mut [&mut id]), Err(NeonPgError::NotMocked)));
        assert!(db.ping().await.is_ok());
        db.close();
    }

    #[tokio::test]
    async fn handlers_receive_statement_and_args() {
        let db = TestDb::new()
            .on_exec(|sql, args| {
                assert_eq!(sql, "DELETE FROM t WHERE id = $1");
                assert_eq!(args, &[RowValues::Int(9)]);
                Ok(CommandTag::new(1))
            })
            .on_query(|_, _| {
                Ok(Box::new(
                    RowsBuilder::new(["n"]).add_row(vec![RowValues::Int(3)]).build(),
                ))
            })
            .on_query_row(|_, _| Box::new(new_row(vec![RowValues::Text("x".into())])));

        let tag = db
            .exec("DELETE FROM t WHERE id = $1", &[RowValues::Int(9)])
            .await
            .unwrap();
        assert_eq!(tag.rows_affected, 1);

        let mut rows = db.query("SELECT n FROM t", &[]).await.unwrap();
        assert!(rows.next());
        assert_eq!(rows.values().unwrap(), vec![RowValues::Int(3)]);
        rows.close();

        let mut s = String::new();
        db.query_row("SELECT 'x'", &[]).await.scan(&mut [&mut s]).unwrap();
        assert_eq!(s, "x");
    }

    #[tokio::test]
    async fn test_tx_counts_and_delegates() {
        let inner = Arc::new(TestDb::new().on_exec(|_, _| Ok(CommandTag::new(2))));
        let tx = TestTx::new().with_db(inner);
        let handle = tx.clone();

        assert_eq!(tx.exec("UPDATE t SET x = 1", &[]).await.unwrap().rows_affected, 2);
        tx.commit().await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(handle.commit_calls(), 1);
        assert_eq!(handle.rollback_calls(), 1);
    }
}
