//! The tokio-postgres driver behind [`Pool`](crate::Pool).

mod connection;
mod manager;
mod params;
mod pool;
mod query;
mod transaction;

pub use connection::PgConn;
pub use manager::PgManager;
pub use params::inferred_type;
pub use pool::{Bb8Factory, PgPool};
pub use query::{buffer_rows, postgres_extract_value};
pub use transaction::PgTx;
