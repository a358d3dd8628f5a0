//! Result mapping strategies.
//!
//! Two interchangeable strategies sit behind `ResultMapper`:
//!
//! - `InPlaceMapper` rewrites the fetched cells' storage. Shape is fixed and
//!   values may only shrink.
//! - `RebuildMapper` hands the whole result to the driver and builds a new
//!   result from what comes back, so columns may be added, removed or renamed.
//!
//! Both preserve the row count. Driver-side failures leave the original
//! result authoritative; only allocation failures surface as a failed fetch.

mod in_place;
mod rebuild;

pub use in_place::{CellView, CellViews, CellWriteError, InPlaceMapper, InPlaceOutcome};
pub use rebuild::{RebuildBatch, RebuildMapper, RebuildOutput};

use crate::config::MappingStrategy;
use crate::driver::{Driver, ValuesCache};
use crate::error::MapError;
use crate::result::ResultSet;
use crate::schema::SchemaAdjuster;

pub trait ResultMapper {
    fn strategy(&self) -> MappingStrategy;

    /// Map one fetched result.
    ///
    /// Takes ownership of `result`; the returned result is either the same
    /// container (possibly mutated) or its replacement, never both.
    fn map(
        &self,
        driver: &mut dyn Driver,
        cache: &mut ValuesCache,
        result: ResultSet,
    ) -> Result<ResultSet, MapError>;
}

/// Mapper for a configured strategy.
pub fn mapper_for(strategy: MappingStrategy) -> Box<dyn ResultMapper> {
    match strategy {
        MappingStrategy::InPlace => Box::new(InPlaceMapper),
        MappingStrategy::Rebuild => Box::new(RebuildMapper::new(SchemaAdjuster::new())),
    }
}
