//! Row cursors.
//!
//! Query results are buffered in full before they reach the caller, so the
//! production cursor and the in-memory test cursor are the same type,
//! [`BufferedRows`].

use std::any::Any;

use crate::error::NeonPgError;
use crate::types::{CommandTag, RowValues};

pub mod rows;
pub mod scan;

pub use rows::{BufferedRow, BufferedRows};
pub use scan::scan_values;

/// A single-pass cursor over a query result.
///
/// Callers must `close` on every path; dropping has the same effect.
pub trait Rows: Send {
    fn columns(&self) -> &[String];

    /// Advance to the next row. Returns false, and closes the cursor, once
    /// the rows run out.
    fn next(&mut self) -> bool;

    /// Copy the current row into `dest`. See [`scan_values`] for the
    /// supported destination types.
    ///
    /// # Errors
    /// [`NeonPgError::NoRows`] before the first `next` or after
    /// exhaustion, [`NeonPgError::Scan`] for arity or type mismatches.
    fn scan(&mut self, dest: &mut [&mut dyn Any]) -> Result<(), NeonPgError>;

    /// The current row's values, untyped.
    ///
    /// # Errors
    /// [`NeonPgError::NoRows`] when not positioned on a row.
    fn values(&self) -> Result<Vec<RowValues>, NeonPgError>;

    /// The first error seen during iteration, if any.
    fn err(&self) -> Option<NeonPgError>;

    fn close(&mut self);

    fn command_tag(&self) -> CommandTag;
}

/// The result of a single-row query. Errors, including "no rows", surface
/// at scan time.
pub trait Row: Send {
    /// # Errors
    /// [`NeonPgError::NoRows`] when the query matched nothing, otherwise
    /// whatever the query or the scan produced.
    fn scan(&self, dest: &mut [&mut dyn Any]) -> Result<(), NeonPgError>;
}
