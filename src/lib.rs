//! Hardened tokio-postgres pooling for serverless Postgres.
//!
//! * [`connect`] turns one connection string into a bb8-backed [`Pool`]:
//!   TLS is mandatory, pooled endpoints get a statement mode that survives
//!   transaction-level multiplexing, and a direct URL for session-level
//!   work is derived when one is not supplied.
//! * [`with_tx`] runs a closure in a transaction with commit, rollback and
//!   panic handling, and a rollback budget the caller cannot cancel.
//! * Errors that cross the API boundary print only log-safe text; the
//!   driver error stays reachable through [`SafeError`].
//! * Application code depends on the [`Db`] trait, which the `test-utils`
//!   feature implements with in-memory doubles.
//!
//! ```rust,no_run
//! use neon_pg::{ConnectionSettings, Db, RowValues, connect, health_check};
//!
//! # async fn demo() -> Result<(), neon_pg::NeonPgError> {
//! let pool = connect(ConnectionSettings::from_env()?).await?;
//! health_check(&pool).await?;
//!
//! let row = pool
//!     .query_row("SELECT name FROM users WHERE id = $1", &[RowValues::Int(1)])
//!     .await;
//! let mut name = String::new();
//! row.scan(&mut [&mut name])?;
//!
//! // Run migrations against pool.direct_url(), never the pooled endpoint.
//! pool.close();
//! # Ok(())
//! # }
//! ```

pub mod config;
mod connect;
pub mod db;
pub mod endpoint;
pub mod error;
mod helpers;
mod pool;
pub mod postgres;
pub mod results;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{ConnectionSettings, PoolConfig, QueryExecMode, SslMode, TlsSettings};
pub use connect::{Connector, connect};
pub use db::{Db, DriverPool, PoolStats, Tx};
pub use endpoint::{is_pooled_host, resolve_direct_url};
pub use error::{BoxError, DirectUrlProblem, DriverError, NeonPgError, SafeError, TransportPolicy};
pub use helpers::{HealthStatus, ROLLBACK_TIMEOUT, health_check, with_tx};
pub use pool::{Pool, PoolFactory};
pub use results::{BufferedRow, BufferedRows, Row, Rows};
pub use types::{AccessMode, CommandTag, IsolationLevel, RowValues, TxOptions};
