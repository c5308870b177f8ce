//! Deterministic in-memory doubles for the [`Db`](crate::Db) surface.
//!
//! Enabled with the `test-utils` feature.

mod db;
mod rows;

pub use db::{TestDb, TestTx};
pub use rows::{ErrRow, ErrRows, RowsBuilder, new_row};
