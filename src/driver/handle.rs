//! Connection-scoped driver handle.

use super::{Driver, DriverFactory, QueryState, ValuesCache};
use crate::error::DriverError;

/// One driver instance plus its transient per-query cache.
///
/// Created once per connection, right after the connection reaches a
/// usable state, and freed before the connection is torn down. Closing
/// consumes the handle; dropping it closes the driver as well, so the
/// driver is released exactly once either way.
pub struct DriverHandle {
    driver: Box<dyn Driver>,
    cache: ValuesCache,
    state: QueryState,
    database: String,
}

impl DriverHandle {
    /// Open a driver for `database` through `factory`.
    pub fn open(factory: &dyn DriverFactory, database: &str) -> Result<Self, DriverError> {
        let driver = factory.open(database)?;
        Ok(Self::from_driver(driver, database))
    }

    pub fn from_driver(driver: Box<dyn Driver>, database: &str) -> Self {
        tracing::debug!(driver = driver.name(), database, "driver handle opened");
        Self {
            driver,
            cache: ValuesCache::new(),
            state: QueryState::Idle,
            database: database.to_string(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn cache(&self) -> &ValuesCache {
        &self.cache
    }

    pub fn report_error(&self, message: &str) {
        self.driver.report_error(message);
    }

    pub(crate) fn split(&mut self) -> (&mut dyn Driver, &mut ValuesCache) {
        (self.driver.as_mut(), &mut self.cache)
    }

    pub(crate) fn query_sent(&mut self) {
        if !self.state.on_sent() {
            tracing::warn!(
                database = %self.database,
                "query sent before the previous query's results were drained"
            );
        }
    }

    pub(crate) fn result_fetched(&mut self) {
        self.state.on_result();
    }

    /// Handle the terminal null result. Clears the cache on the first
    /// terminal signal after a send; later signals are no-ops.
    pub(crate) fn drain(&mut self) {
        if !self.state.on_terminal() {
            return;
        }
        match self.driver.clear_values_cache(&mut self.cache) {
            Ok(()) => tracing::debug!(
                generation = self.cache.generation(),
                "values cache cleared"
            ),
            Err(err) => self.driver.report_error(&err.to_string()),
        }
        self.state.on_cleared();
    }

    /// Free the driver. The handle cannot be used afterwards.
    pub fn close(self) {
        // Drop does the work.
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        self.driver.close();
        tracing::debug!(database = %self.database, "driver handle freed");
    }
}

impl std::fmt::Debug for DriverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverHandle")
            .field("driver", &self.driver.name())
            .field("database", &self.database)
            .field("state", &self.state)
            .field("cached_values", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Counters {
        clears: Cell<usize>,
        closes: Cell<usize>,
    }

    struct CountingDriver {
        counters: Rc<Counters>,
        fail_clear: bool,
    }

    impl Driver for CountingDriver {
        fn clear_values_cache(&mut self, cache: &mut ValuesCache) -> Result<(), DriverError> {
            self.counters.clears.set(self.counters.clears.get() + 1);
            if self.fail_clear {
                return Err(DriverError::CacheClear("backing store gone".into()));
            }
            cache.clear();
            Ok(())
        }

        fn close(&mut self) {
            self.counters.closes.set(self.counters.closes.get() + 1);
        }
    }

    fn handle(fail_clear: bool) -> (DriverHandle, Rc<Counters>) {
        let counters = Rc::new(Counters::default());
        let driver = CountingDriver {
            counters: Rc::clone(&counters),
            fail_clear,
        };
        (DriverHandle::from_driver(Box::new(driver), "app"), counters)
    }

    #[test]
    fn test_drain_clears_once() {
        let (mut handle, counters) = handle(false);
        handle.query_sent();
        handle.result_fetched();
        handle.result_fetched();
        handle.drain();
        handle.drain();
        handle.drain();

        assert_eq!(counters.clears.get(), 1);
        assert_eq!(handle.state(), QueryState::Idle);
        assert_eq!(handle.cache().generation(), 1);
    }

    #[test]
    fn test_clear_failure_still_returns_to_idle() {
        let (mut handle, counters) = handle(true);
        handle.query_sent();
        handle.drain();

        assert_eq!(counters.clears.get(), 1);
        assert_eq!(handle.state(), QueryState::Idle);
    }

    #[test]
    fn test_close_and_drop_free_once() {
        let (handle, counters) = handle(false);
        handle.close();
        assert_eq!(counters.closes.get(), 1);

        let (handle, counters) = self::handle(false);
        drop(handle);
        assert_eq!(counters.closes.get(), 1);
    }

    #[test]
    fn test_open_through_factory() {
        let factory = |db: &str| -> Result<Box<dyn Driver>, DriverError> {
            if db.is_empty() {
                return Err(DriverError::Uninitialized("no database".into()));
            }
            Ok(Box::new(super::super::PassThroughDriver))
        };

        let handle = DriverHandle::open(&factory, "app").unwrap();
        assert_eq!(handle.database(), "app");
        assert_eq!(handle.driver_name(), "passthrough");

        let err = DriverHandle::open(&factory, "").unwrap_err();
        assert_eq!(err, DriverError::Uninitialized("no database".into()));
    }
}
