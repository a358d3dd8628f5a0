//! The external transformation driver boundary.
//!
//! A `Driver` is the opaque capability that encrypts parameters and
//! decrypts (or reshapes) results. Each connection owns at most one,
//! wrapped in a `DriverHandle` together with its per-query `ValuesCache`.
//!
//! - `handle.rs` - `DriverHandle`, connection-scoped ownership and drain bookkeeping
//! - `cache.rs` - `ValuesCache`, transient per-query state
//! - `lifecycle.rs` - `QueryState` transitions
//! - `builtin.rs` - drivers shipped with the crate

mod builtin;
mod cache;
mod handle;
mod lifecycle;

pub use builtin::{ByteaHexDriver, EnvelopeDriver, IdentityDriver, PassThroughDriver, builtin};
pub use cache::ValuesCache;
pub use handle::DriverHandle;
pub use lifecycle::QueryState;

use crate::adaptee::{ClientLibrary, Oid, QueryParams, SendResult};
use crate::error::DriverError;
use crate::mapper::{CellViews, InPlaceOutcome, RebuildBatch, RebuildOutput};

/// Operations a transformation driver provides.
///
/// Every submission hook receives the raw `adaptee`: the driver rewrites
/// what it needs and then calls the matching adaptee entry point itself,
/// or refuses by returning an error. Auxiliary statements the driver needs
/// (catalog lookups) go through `adaptee.exec`, which is never intercepted.
///
/// All methods have pass-through defaults, so a driver only overrides the
/// hooks it cares about.
pub trait Driver {
    /// Short name used in diagnostics.
    fn name(&self) -> &str {
        "driver"
    }

    fn map_query(
        &mut self,
        adaptee: &mut dyn ClientLibrary,
        _cache: &mut ValuesCache,
        query: &str,
    ) -> SendResult {
        adaptee.send_query(query)
    }

    fn map_query_params(
        &mut self,
        adaptee: &mut dyn ClientLibrary,
        _cache: &mut ValuesCache,
        command: &str,
        params: &QueryParams<'_>,
    ) -> SendResult {
        adaptee.send_query_params(command, params)
    }

    fn send_prepared(
        &mut self,
        adaptee: &mut dyn ClientLibrary,
        _cache: &mut ValuesCache,
        stmt_name: &str,
        params: &QueryParams<'_>,
    ) -> SendResult {
        adaptee.send_query_prepared(stmt_name, params)
    }

    fn send_prepare(
        &mut self,
        adaptee: &mut dyn ClientLibrary,
        _cache: &mut ValuesCache,
        stmt_name: &str,
        query: &str,
        param_types: &[Oid],
    ) -> SendResult {
        adaptee.send_prepare(stmt_name, query, param_types)
    }

    /// Rewrite cells in place. Values may only shrink; see `CellView::write`.
    fn map_result_in_place(
        &mut self,
        _cache: &mut ValuesCache,
        _cells: &mut CellViews<'_>,
    ) -> Result<InPlaceOutcome, DriverError> {
        Ok(InPlaceOutcome::Unmapped)
    }

    /// Produce a replacement column set and row-major values.
    ///
    /// Returning zero columns means "no transformation".
    fn map_result_rebuild(
        &mut self,
        _cache: &mut ValuesCache,
        _batch: &RebuildBatch<'_>,
    ) -> Result<RebuildOutput, DriverError> {
        Ok(RebuildOutput::empty())
    }

    /// Drop per-query state once a query's results are drained.
    fn clear_values_cache(&mut self, cache: &mut ValuesCache) -> Result<(), DriverError> {
        cache.clear();
        Ok(())
    }

    /// Fire-and-forget diagnostic sink. Never fatal.
    fn report_error(&self, message: &str) {
        tracing::warn!(target: "pqext::driver", driver = self.name(), "{}", message);
    }

    /// Release driver resources. Called exactly once, before the
    /// underlying connection is torn down.
    fn close(&mut self) {}
}

/// Creates a driver for a freshly established connection.
pub trait DriverFactory {
    fn open(&self, database: &str) -> Result<Box<dyn Driver>, DriverError>;
}

impl<F> DriverFactory for F
where
    F: Fn(&str) -> Result<Box<dyn Driver>, DriverError>,
{
    fn open(&self, database: &str) -> Result<Box<dyn Driver>, DriverError> {
        self(database)
    }
}
