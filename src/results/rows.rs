use std::any::Any;
use std::sync::Arc;

use super::scan::scan_values;
use super::{Row, Rows};
use crate::error::NeonPgError;
use crate::types::{CommandTag, RowValues};

/// An in-memory, single-pass cursor over a fixed table of values.
///
/// Every row has exactly one value per column. The position starts before
/// the first row; [`Rows::next`] moves it forward and closes the cursor
/// when it runs past the end.
#[derive(Debug, Clone)]
pub struct BufferedRows {
    columns: Arc<Vec<String>>,
    data: Vec<Vec<RowValues>>,
    // -1 before the first row, data.len() once exhausted
    idx: isize,
    closed: bool,
    scan_err: Option<NeonPgError>,
    tag: CommandTag,
}

impl BufferedRows {
    /// # Panics
    /// Panics if any row's length differs from the column count.
    #[must_use]
    pub fn new(columns: Arc<Vec<String>>, data: Vec<Vec<RowValues>>) -> Self {
        for row in &data {
            assert_eq!(
                row.len(),
                columns.len(),
                "BufferedRows: column count mismatch"
            );
        }
        let tag = CommandTag::new(data.len() as u64);
        Self {
            columns,
            data,
            idx: -1,
            closed: false,
            scan_err: None,
            tag,
        }
    }

    #[must_use]
    pub fn with_command_tag(mut self, tag: CommandTag) -> Self {
        self.tag = tag;
        self
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn current(&self) -> Option<&Vec<RowValues>> {
        usize::try_from(self.idx).ok().and_then(|i| self.data.get(i))
    }
}

impl Rows for BufferedRows {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.idx += 1;
        if self.current().is_none() {
            self.closed = true;
            return false;
        }
        true
    }

    fn scan(&mut self, dest: &mut [&mut dyn Any]) -> Result<(), NeonPgError> {
        let Some(row) = self.current() else {
            return Err(NeonPgError::NoRows);
        };
        let result = scan_values("BufferedRows", row, dest);
        if let Err(err) = &result {
            self.scan_err = Some(err.clone());
        }
        result
    }

    fn values(&self) -> Result<Vec<RowValues>, NeonPgError> {
        self.current().cloned().ok_or(NeonPgError::NoRows)
    }

    fn err(&self) -> Option<NeonPgError> {
        self.scan_err.clone()
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn command_tag(&self) -> CommandTag {
        self.tag
    }
}

/// A row that either holds values or the error that replaced them.
#[derive(Debug, Clone)]
pub struct BufferedRow {
    outcome: Result<Vec<RowValues>, NeonPgError>,
}

impl BufferedRow {
    #[must_use]
    pub fn new(values: Vec<RowValues>) -> Self {
        Self { outcome: Ok(values) }
    }

    #[must_use]
    pub fn from_error(err: NeonPgError) -> Self {
        Self { outcome: Err(err) }
    }

    /// Take the first row of `rows`, or "no rows".
    pub fn first_of(rows: &mut dyn Rows) -> Self {
        let row = if rows.next() {
            rows.values().map_or_else(Self::from_error, Self::new)
        } else {
            Self::from_error(rows.err().unwrap_or(NeonPgError::NoRows))
        };
        rows.close();
        row
    }
}

impl Row for BufferedRow {
    fn scan(&self, dest: &mut [&mut dyn Any]) -> Result<(), NeonPgError> {
        match &self.outcome {
            Ok(values) => scan_values("BufferedRow", values, dest),
            Err(err) => Err(err.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_rows() -> BufferedRows {
        BufferedRows::new(
            Arc::new(vec!["id".into(), "name".into()]),
            vec![
                vec![RowValues::Int(1), RowValues::Text("a".into())],
                vec![RowValues::Int(2), RowValues::Text("b".into())],
            ],
        )
    }

    #[test]
    fn walks_rows_then_reports_no_rows() {
        let mut rows = two_rows();
        let (mut id, mut name) = (0i64, String::new());

        assert!(matches!(rows.scan(&mut [&mut id, &mut name]), Err(NeonPgError::NoRows)));

        assert!(rows.next());
        rows.scan(&mut [&mut id, &mut name]).unwrap();
        assert_eq!((id, name.as_str()), (1, "a"));

        assert!(rows.next());
        rows.scan(&mut [&mut id, &mut name]).unwrap();
        assert_eq!((id, name.as_str()), (2, "b"));

        assert!(!rows.next());
        assert!(rows.is_closed());
        assert!(matches!(rows.scan(&mut [&mut id, &mut name]), Err(NeonPgError::NoRows)));
        assert!(matches!(rows.values(), Err(NeonPgError::NoRows)));
        assert!(!rows.next());
        assert!(rows.err().is_none());
    }

    #[test]
    fn scan_error_is_recorded() {
        let mut rows = two_rows();
        assert!(rows.next());
        let mut id = 0i64;
        let err = rows.scan(&mut [&mut id]).unwrap_err();
        assert!(err.to_string().contains("scan dest count 1 != column count 2"));
        assert_eq!(rows.err().map(|e| e.to_string()), Some(err.to_string()));
    }

    #[test]
    fn close_stops_iteration() {
        let mut rows = two_rows();
        rows.close();
        assert!(!rows.next());
        assert_eq!(rows.command_tag(), CommandTag::new(2));
    }

    #[test]
    #[should_panic(expected = "column count mismatch")]
    fn arity_is_checked_at_construction() {
        let _ = BufferedRows::new(Arc::new(vec!["id".into()]), vec![vec![]]);
    }

    #[test]
    fn first_of_takes_the_first_row_or_no_rows() {
        let mut rows = two_rows();
        let row = BufferedRow::first_of(&mut rows);
        let mut id = 0i64;
        let mut name = String::new();
        row.scan(&mut [&mut id, &mut name]).unwrap();
        assert_eq!(id, 1);

        let mut empty = BufferedRows::new(Arc::new(vec!["id".into()]), vec![]);
        let row = BufferedRow::first_of(&mut empty);
        assert!(matches!(row.scan(&mut [&mut id]), Err(NeonPgError::NoRows)));
    }
}
