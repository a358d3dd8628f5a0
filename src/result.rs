//! Query results.
//!
//! A `ResultSet` is the owned container a fetch hands back: a status, the
//! column descriptors and a row-major grid of nullable cells. Every row has
//! exactly `column_count()` cells.

use crate::schema::{FieldDescriptor, Schema};
use serde::Deserialize;
use thiserror::Error;

/// One result cell: raw bytes, or NULL.
pub type Cell = Option<Vec<u8>>;

/// Result status (libpq `ExecStatusType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum ExecStatus {
    EmptyQuery,
    CommandOk,
    TuplesOk,
    CopyOut,
    CopyIn,
    BadResponse,
    NonfatalError,
    FatalError,
    CopyBoth,
    SingleTuple,
    PipelineSync,
    PipelineAborted,
}

impl ExecStatus {
    pub fn is_error(self) -> bool {
        matches!(
            self,
            ExecStatus::BadResponse | ExecStatus::FatalError | ExecStatus::PipelineAborted
        )
    }
}

/// A row did not match the column count of its result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("row has {found} cells but the result has {expected} columns")]
pub struct ShapeError {
    pub expected: usize,
    pub found: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    status: ExecStatus,
    schema: Schema,
    cells: Vec<Cell>,
    rows: usize,
    error_message: Option<String>,
}

impl ResultSet {
    /// Empty result with the given status and columns.
    pub fn new(status: ExecStatus, schema: Schema) -> Self {
        Self {
            status,
            schema,
            cells: Vec::new(),
            rows: 0,
            error_message: None,
        }
    }

    /// Result of a command that returns no rows.
    pub fn command_ok() -> Self {
        Self::new(ExecStatus::CommandOk, Schema::default())
    }

    /// A failed result carrying an error message.
    pub fn failed(status: ExecStatus, message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::new(status, Schema::default())
        }
    }

    /// Build a `TuplesOk` result from column names and rows.
    pub fn from_rows<S: AsRef<str>>(columns: &[S], rows: Vec<Vec<Cell>>) -> Result<Self, ShapeError> {
        let mut result = Self::new(ExecStatus::TuplesOk, Schema::from_names(columns));
        for row in rows {
            result.push_row(row)?;
        }
        Ok(result)
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<(), ShapeError> {
        if row.len() != self.schema.len() {
            return Err(ShapeError {
                expected: self.schema.len(),
                found: row.len(),
            });
        }
        self.cells.extend(row);
        self.rows += 1;
        Ok(())
    }

    /// Assemble from a row-major cell list already known to be `rows * schema.len()` long.
    pub(crate) fn from_parts(status: ExecStatus, schema: Schema, cells: Vec<Cell>, rows: usize) -> Self {
        debug_assert_eq!(cells.len(), rows * schema.len());
        Self {
            status,
            schema,
            cells,
            rows,
            error_message: None,
        }
    }

    pub fn status(&self) -> ExecStatus {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        self.schema.fields()
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.schema.len()
    }

    pub fn column_name(&self, col: usize) -> Option<&str> {
        self.schema.field(col).map(|f| f.name.as_str())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.index_of(name)
    }

    fn offset(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.rows && col < self.column_count()).then(|| row * self.column_count() + col)
    }

    /// Raw bytes of a cell; `None` for NULL or out of range.
    pub fn value(&self, row: usize, col: usize) -> Option<&[u8]> {
        self.cells.get(self.offset(row, col)?)?.as_deref()
    }

    /// Out-of-range cells count as NULL.
    pub fn is_null(&self, row: usize, col: usize) -> bool {
        self.value(row, col).is_none()
    }

    /// Byte length of a cell, 0 for NULL (as `PQgetlength`).
    pub fn length(&self, row: usize, col: usize) -> usize {
        self.value(row, col).map_or(0, <[u8]>::len)
    }

    pub fn row(&self, row: usize) -> Option<Row<'_>> {
        (row < self.rows).then(|| {
            let width = self.column_count();
            Row {
                schema: &self.schema,
                cells: &self.cells[row * width..(row + 1) * width],
            }
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        (0..self.rows).filter_map(|r| self.row(r))
    }

    /// All cells, row-major.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }
}

/// Borrowed view of one row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    schema: &'a Schema,
    cells: &'a [Cell],
}

impl<'a> Row<'a> {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Raw bytes of a column.
    pub fn get_bytes(&self, idx: usize) -> Option<&'a [u8]> {
        self.cells.get(idx)?.as_deref()
    }

    /// Column value as String. `None` for NULL or invalid UTF-8.
    pub fn get_string(&self, idx: usize) -> Option<String> {
        std::str::from_utf8(self.get_bytes(idx)?).ok().map(str::to_string)
    }

    pub fn get_i64(&self, idx: usize) -> Option<i64> {
        std::str::from_utf8(self.get_bytes(idx)?).ok()?.parse().ok()
    }

    pub fn get_bool(&self, idx: usize) -> Option<bool> {
        match std::str::from_utf8(self.get_bytes(idx)?).ok()? {
            "t" | "true" | "1" => Some(true),
            "f" | "false" | "0" => Some(false),
            _ => None,
        }
    }

    /// Out-of-range columns count as NULL.
    pub fn is_null(&self, idx: usize) -> bool {
        self.cells.get(idx).is_none_or(Option::is_none)
    }

    /// String, defaulting to empty if NULL.
    pub fn text(&self, idx: usize) -> String {
        self.get_string(idx).unwrap_or_default()
    }

    pub fn get_string_by_name(&self, name: &str) -> Option<String> {
        self.get_string(self.schema.index_of(name)?)
    }

    pub fn get_bytes_by_name(&self, name: &str) -> Option<&'a [u8]> {
        self.get_bytes(self.schema.index_of(name)?)
    }

    pub fn is_null_by_name(&self, name: &str) -> bool {
        self.schema
            .index_of(name)
            .is_none_or(|idx| self.is_null(idx))
    }
}
