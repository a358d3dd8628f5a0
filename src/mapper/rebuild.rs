//! Rebuild mapping: replace the result with a driver-shaped one.

use super::ResultMapper;
use crate::config::MappingStrategy;
use crate::driver::{Driver, ValuesCache};
use crate::error::{DriverError, MapError};
use crate::result::{Cell, ResultSet};
use crate::schema::SchemaAdjuster;

/// Borrowed, row-major view of a fetched result handed to the driver.
#[derive(Debug)]
pub struct RebuildBatch<'a> {
    columns: Vec<&'a str>,
    values: Vec<Option<&'a [u8]>>,
    rows: usize,
}

impl<'a> RebuildBatch<'a> {
    pub(crate) fn from_result(result: &'a ResultSet) -> Result<Self, MapError> {
        let total = result.cells().len();
        let oom = |_| MapError::Allocation { cells: total };

        let mut columns = Vec::new();
        columns.try_reserve_exact(result.column_count()).map_err(oom)?;
        columns.extend(result.schema().names());

        let mut values = Vec::new();
        values.try_reserve_exact(total).map_err(oom)?;
        values.extend(result.cells().iter().map(Option::as_deref));

        Ok(Self {
            columns,
            values,
            rows: result.row_count(),
        })
    }

    pub fn columns(&self) -> &[&'a str] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// All values, row-major.
    pub fn values(&self) -> &[Option<&'a [u8]>] {
        &self.values
    }

    pub fn value(&self, row: usize, col: usize) -> Option<&'a [u8]> {
        if row >= self.rows || col >= self.columns.len() {
            return None;
        }
        self.values[row * self.columns.len() + col]
    }

    pub fn row(&self, row: usize) -> Option<&[Option<&'a [u8]>]> {
        let width = self.columns.len();
        (row < self.rows).then(|| &self.values[row * width..(row + 1) * width])
    }
}

/// What the driver hands back from a rebuild.
///
/// `values` is row-major and must hold exactly `rows * columns.len()`
/// entries. Zero columns means the driver did not transform anything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RebuildOutput {
    pub columns: Vec<String>,
    pub values: Vec<Cell>,
}

impl RebuildOutput {
    pub fn new(columns: Vec<String>, values: Vec<Cell>) -> Self {
        Self { columns, values }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Builds a new result from the driver's column set and values.
#[derive(Debug, Clone, Copy, Default)]
pub struct RebuildMapper {
    adjuster: SchemaAdjuster,
}

impl RebuildMapper {
    pub fn new(adjuster: SchemaAdjuster) -> Self {
        Self { adjuster }
    }
}

impl ResultMapper for RebuildMapper {
    fn strategy(&self) -> MappingStrategy {
        MappingStrategy::Rebuild
    }

    fn map(
        &self,
        driver: &mut dyn Driver,
        cache: &mut ValuesCache,
        result: ResultSet,
    ) -> Result<ResultSet, MapError> {
        let rows = result.row_count();
        let output = {
            let batch = RebuildBatch::from_result(&result)?;
            driver.map_result_rebuild(cache, &batch)
        };

        let output = match output {
            Ok(output) => output,
            Err(DriverError::Allocation(message)) => {
                driver.report_error(&message);
                return Err(MapError::Allocation {
                    cells: result.cells().len(),
                });
            }
            Err(err) => {
                driver.report_error(&format!("rebuild skipped: {}", err));
                return Ok(result);
            }
        };

        if output.is_empty() {
            return Ok(result);
        }

        let expected = rows * output.columns.len();
        if output.values.len() != expected {
            driver.report_error(&format!(
                "rebuild returned {} values for {} rows x {} columns; keeping original result",
                output.values.len(),
                rows,
                output.columns.len()
            ));
            return Ok(result);
        }

        let schema = self.adjuster.adjust(result.schema(), &output.columns);
        let rebuilt = ResultSet::from_parts(result.status(), schema, output.values, rows);
        drop(result);
        Ok(rebuilt)
    }
}
