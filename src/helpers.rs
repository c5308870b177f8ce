//! Transaction and health-check helpers over any [`Db`].

use std::panic::{AssertUnwindSafe, resume_unwind};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::db::{Db, Tx};
use crate::error::{NeonPgError, SafeError};
use crate::types::TxOptions;

/// Budget for a cleanup rollback, counted from the moment it starts.
pub const ROLLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Body of a health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub database: String,
}

/// Ping `db` and report a status suitable for a health endpoint.
///
/// # Errors
/// Returns [`NeonPgError::Safe`] wrapping the ping failure.
pub async fn health_check(db: &dyn Db) -> Result<HealthStatus, NeonPgError> {
    db.ping()
        .await
        .map_err(|err| SafeError::new("neon-pg: health check failed", err))?;
    Ok(HealthStatus {
        status: "ok".to_string(),
        database: "neon".to_string(),
    })
}

/// Run `work` inside a transaction.
///
/// Commits when `work` returns `Ok`. Rolls back when it returns `Err`, which
/// is then returned unchanged, or when it panics, in which case the panic
/// resumes after the rollback. A failed commit is followed by a rollback
/// attempt and reported as `"commit tx failed"`. Rollback errors are never
/// reported, and each rollback gets [`ROLLBACK_TIMEOUT`] of its own.
///
/// Dropping the returned future while the transaction is open (a caller
/// timeout, a cancelled task) still rolls back, on a detached task.
///
/// ```rust,no_run
/// # async fn demo(db: &dyn neon_pg::Db) -> Result<(), neon_pg::NeonPgError> {
/// use neon_pg::{RowValues, TxOptions, with_tx};
///
/// with_tx(db, TxOptions::default(), |tx| {
///     Box::pin(async move {
///         tx.exec("UPDATE accounts SET balance = balance - $1 WHERE id = $2",
///                 &[RowValues::Int(10), RowValues::Int(1)]).await?;
///         tx.exec("UPDATE accounts SET balance = balance + $1 WHERE id = $2",
///                 &[RowValues::Int(10), RowValues::Int(2)]).await?;
///         Ok(())
///     })
/// })
/// .await
/// # }
/// ```
///
/// # Errors
/// `"begin tx failed"` and `"commit tx failed"` arrive as `E::from(SafeError)`;
/// anything else is the error `work` returned.
pub async fn with_tx<T, E, F>(db: &dyn Db, opts: TxOptions, work: F) -> Result<T, E>
where
    F: for<'t> FnOnce(&'t dyn Tx) -> BoxFuture<'t, Result<T, E>>,
    E: From<SafeError>,
{
    let tx: Arc<dyn Tx> = match db.begin_tx(opts).await {
        Ok(tx) => Arc::from(tx),
        Err(err) => return Err(SafeError::new("neon-pg: begin tx failed", err).into()),
    };
    let mut guard = RollbackGuard::new(Arc::clone(&tx));

    let outcome = AssertUnwindSafe(async { work(tx.as_ref()).await })
        .catch_unwind()
        .await;

    match outcome {
        Err(panic) => {
            guard.rollback().await;
            resume_unwind(panic)
        }
        Ok(Err(err)) => {
            guard.rollback().await;
            Err(err)
        }
        Ok(Ok(value)) => match tx.commit().await {
            Ok(()) => {
                guard.disarm();
                Ok(value)
            }
            Err(cause) => {
                guard.rollback().await;
                Err(SafeError::new("neon-pg: commit tx failed", cause).into())
            }
        },
    }
}

/// Rolls back on drop unless disarmed or already used.
struct RollbackGuard {
    tx: Option<Arc<dyn Tx>>,
}

impl RollbackGuard {
    fn new(tx: Arc<dyn Tx>) -> Self {
        Self { tx: Some(tx) }
    }

    async fn rollback(&mut self) {
        if let Some(tx) = self.tx.take() {
            rollback_within_budget(tx.as_ref()).await;
        }
    }

    fn disarm(&mut self) {
        self.tx = None;
    }
}

impl Drop for RollbackGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take()
            && let Ok(handle) = Handle::try_current()
        {
            debug!("transaction abandoned by caller; rolling back in background");
            handle.spawn(async move {
                rollback_within_budget(tx.as_ref()).await;
            });
        }
    }
}

async fn rollback_within_budget(tx: &dyn Tx) {
    match timeout(ROLLBACK_TIMEOUT, tx.rollback()).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => debug!(error = %err, "rollback failed during cleanup"),
        Err(_) => warn!(budget = ?ROLLBACK_TIMEOUT, "rollback timed out during cleanup"),
    }
}
