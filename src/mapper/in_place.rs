//! In-place mapping: rewrite existing cell storage, shrink only.

use super::ResultMapper;
use crate::config::MappingStrategy;
use crate::driver::{Driver, ValuesCache};
use crate::error::{DriverError, MapError};
use crate::result::{Cell, ResultSet};
use thiserror::Error;

/// What the driver did with an in-place batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InPlaceOutcome {
    /// Revised lengths must be applied.
    Mapped,
    /// Nothing was transformed; the result stays as fetched.
    Unmapped,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellWriteError {
    #[error("cannot write to a NULL cell")]
    Null,
    #[error("value of {len} bytes does not fit a cell of {capacity} bytes")]
    TooLong { len: usize, capacity: usize },
    #[error("cannot stage a write of {capacity} bytes")]
    Allocation { capacity: usize },
}

impl From<CellWriteError> for DriverError {
    fn from(err: CellWriteError) -> Self {
        match err {
            CellWriteError::Allocation { .. } => DriverError::Allocation(err.to_string()),
            _ => DriverError::Mapping(err.to_string()),
        }
    }
}

/// Non-owning view over one cell's bytes, or a NULL marker.
///
/// Writes are staged, not applied: the fetched bytes stay untouched until
/// the driver reports `InPlaceOutcome::Mapped`. A view can rewrite up to
/// the cell's original length and report a shorter one; the backing
/// storage is never reallocated.
#[derive(Debug)]
pub struct CellView<'a> {
    data: Option<&'a mut Vec<u8>>,
    staged: Option<Vec<u8>>,
    len: usize,
    original: usize,
}

impl<'a> CellView<'a> {
    fn new(cell: &'a mut Cell) -> Self {
        let original = cell.as_ref().map_or(0, Vec::len);
        Self {
            data: cell.as_mut(),
            staged: None,
            len: original,
            original,
        }
    }

    pub fn is_null(&self) -> bool {
        self.data.is_none()
    }

    /// Current length (0 for NULL).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Largest value this cell can hold: its length as fetched.
    pub fn capacity(&self) -> usize {
        self.original
    }

    /// Current bytes, including staged writes. `None` for NULL.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.staged {
            Some(staged) => Some(&staged[..self.len]),
            None => self.data.as_deref().map(|data| &data[..self.len]),
        }
    }

    /// Overwrite the cell with `value`.
    pub fn write(&mut self, value: &[u8]) -> Result<(), CellWriteError> {
        let Some(data) = self.data.as_deref() else {
            return Err(CellWriteError::Null);
        };
        if value.len() > self.original {
            return Err(CellWriteError::TooLong {
                len: value.len(),
                capacity: self.original,
            });
        }

        if self.staged.is_none() {
            let mut staged = Vec::new();
            staged
                .try_reserve_exact(self.original)
                .map_err(|_| CellWriteError::Allocation {
                    capacity: self.original,
                })?;
            staged.extend_from_slice(data);
            self.staged = Some(staged);
        }
        if let Some(staged) = self.staged.as_mut() {
            staged[..value.len()].copy_from_slice(value);
        }
        self.len = value.len();
        Ok(())
    }

    /// Report a shorter length without rewriting bytes.
    pub fn truncate(&mut self, len: usize) -> Result<(), CellWriteError> {
        if self.data.is_none() {
            return Err(CellWriteError::Null);
        }
        if len > self.original {
            return Err(CellWriteError::TooLong {
                len,
                capacity: self.original,
            });
        }
        self.len = len;
        Ok(())
    }

    fn apply(self) {
        let Some(data) = self.data else {
            return;
        };
        if let Some(staged) = &self.staged {
            data[..self.len].copy_from_slice(&staged[..self.len]);
        }
        // Vec::truncate keeps the allocation.
        data.truncate(self.len);
    }
}

/// Fixed-length, column-major list of cell views over one result.
///
/// Index `i` addresses row `i % rows` of column `i / rows`.
#[derive(Debug)]
pub struct CellViews<'a> {
    views: Vec<CellView<'a>>,
    rows: usize,
    columns: usize,
}

impl<'a> CellViews<'a> {
    pub(crate) fn column_major(result: &'a mut ResultSet) -> Result<Self, MapError> {
        let rows = result.row_count();
        let columns = result.column_count();
        let total = rows * columns;
        let oom = |_| MapError::Allocation { cells: total };

        let mut views = Vec::new();
        views.try_reserve_exact(total).map_err(oom)?;

        if columns > 0 {
            let mut row_cells = Vec::new();
            row_cells.try_reserve_exact(rows).map_err(oom)?;
            row_cells.extend(
                result
                    .cells_mut()
                    .chunks_exact_mut(columns)
                    .map(|row| row.iter_mut()),
            );
            for _ in 0..columns {
                for cells in row_cells.iter_mut() {
                    if let Some(cell) = cells.next() {
                        views.push(CellView::new(cell));
                    }
                }
            }
        }

        Ok(Self {
            views,
            rows,
            columns,
        })
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn get(&self, index: usize) -> Option<&CellView<'a>> {
        self.views.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut CellView<'a>> {
        self.views.get_mut(index)
    }

    /// `(row, column)` of a flat index.
    pub fn position(&self, index: usize) -> Option<(usize, usize)> {
        (index < self.views.len()).then(|| (index % self.rows, index / self.rows))
    }

    /// All cells of one column, top to bottom.
    pub fn column_mut(&mut self, col: usize) -> Option<&mut [CellView<'a>]> {
        (col < self.columns).then(|| &mut self.views[col * self.rows..(col + 1) * self.rows])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CellView<'a>> {
        self.views.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, CellView<'a>> {
        self.views.iter_mut()
    }

    /// Second pass: commit staged bytes and revised lengths in the same order.
    fn apply(self) {
        for view in self.views {
            view.apply();
        }
    }
}

/// Rewrites fetched cells through the driver without changing the shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct InPlaceMapper;

impl ResultMapper for InPlaceMapper {
    fn strategy(&self) -> MappingStrategy {
        MappingStrategy::InPlace
    }

    fn map(
        &self,
        driver: &mut dyn Driver,
        cache: &mut ValuesCache,
        mut result: ResultSet,
    ) -> Result<ResultSet, MapError> {
        let cells = result.row_count() * result.column_count();
        let outcome = {
            let mut views = CellViews::column_major(&mut result)?;
            let outcome = driver.map_result_in_place(cache, &mut views);
            if let Ok(InPlaceOutcome::Mapped) = outcome {
                views.apply();
            }
            outcome
        };

        match outcome {
            Ok(_) => Ok(result),
            Err(DriverError::Allocation(message)) => {
                driver.report_error(&message);
                Err(MapError::Allocation { cells })
            }
            Err(err) => {
                driver.report_error(&format!("in-place mapping skipped: {}", err));
                Ok(result)
            }
        }
    }
}
