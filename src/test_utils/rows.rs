use std::any::Any;
use std::sync::Arc;

use crate::error::NeonPgError;
use crate::results::{BufferedRow, BufferedRows, Row, Rows};
use crate::types::{CommandTag, RowValues};

/// A row whose `scan` always fails with the given error.
#[derive(Debug, Clone)]
pub struct ErrRow(pub NeonPgError);

impl Row for ErrRow {
    fn scan(&self, _dest: &mut [&mut dyn Any]) -> Result<(), NeonPgError> {
        Err(self.0.clone())
    }
}

/// A row backed by `values`. Scanning checks arity and kinds.
#[must_use]
pub fn new_row(values: Vec<RowValues>) -> BufferedRow {
    BufferedRow::new(values)
}

/// A cursor that yields no rows and reports the same error from `err`,
/// `scan` and `values`. Closing it any number of times is fine.
#[derive(Debug, Clone)]
pub struct ErrRows(pub NeonPgError);

impl Rows for ErrRows {
    fn columns(&self) -> &[String] {
        &[]
    }

    fn next(&mut self) -> bool {
        false
    }

    fn scan(&mut self, _dest: &mut [&mut dyn Any]) -> Result<(), NeonPgError> {
        Err(self.0.clone())
    }

    fn values(&self) -> Result<Vec<RowValues>, NeonPgError> {
        Err(self.0.clone())
    }

    fn err(&self) -> Option<NeonPgError> {
        Some(self.0.clone())
    }

    fn close(&mut self) {}

    fn command_tag(&self) -> CommandTag {
        CommandTag::default()
    }
}

/// Builds an in-memory cursor row by row.
///
/// ```rust
/// use neon_pg::test_utils::RowsBuilder;
/// use neon_pg::{RowValues, Rows};
///
/// let mut rows = RowsBuilder::new(["id", "name"])
///     .add_row(vec![RowValues::Int(1), RowValues::Text("a".into())])
///     .build();
/// assert!(rows.next());
/// let (mut id, mut name) = (0i64, String::new());
/// rows.scan(&mut [&mut id, &mut name]).unwrap();
/// assert_eq!((id, name.as_str()), (1, "a"));
/// assert!(!rows.next());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RowsBuilder {
    columns: Vec<String>,
    rows: Vec<Vec<RowValues>>,
}

impl RowsBuilder {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// # Panics
    /// Panics immediately if `values` does not have one entry per column.
    #[must_use]
    pub fn add_row(mut self, values: Vec<RowValues>) -> Self {
        assert!(
            values.len() == self.columns.len(),
            "RowsBuilder: column count mismatch (row has {}, expected {})",
            values.len(),
            self.columns.len()
        );
        self.rows.push(values);
        self
    }

    #[must_use]
    pub fn build(self) -> BufferedRows {
        BufferedRows::new(Arc::new(self.columns), self.rows)
    }
}
