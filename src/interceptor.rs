//! Query submission interception.
//!
//! Each entry point hands its arguments, together with the raw adaptee, to
//! the connection's driver. Without a driver the pass-through driver is
//! used, which calls the adaptee with the arguments untouched.

use crate::adaptee::{ClientLibrary, Oid, QueryParams, SendResult};
use crate::driver::{Driver, DriverHandle, PassThroughDriver, ValuesCache};

/// Routes one submission through the driver.
///
/// Built per call; borrows the adaptee and (if any) the driver handle.
pub struct QueryInterceptor<'c> {
    adaptee: &'c mut dyn ClientLibrary,
    handle: Option<&'c mut DriverHandle>,
    warn_unconfigured: bool,
}

impl<'c> QueryInterceptor<'c> {
    pub fn new(adaptee: &'c mut dyn ClientLibrary, handle: Option<&'c mut DriverHandle>) -> Self {
        Self {
            adaptee,
            handle,
            warn_unconfigured: false,
        }
    }

    /// Emit the driver-uninitialized warning when no handle is present.
    pub fn warn_unconfigured(mut self, warn: bool) -> Self {
        self.warn_unconfigured = warn;
        self
    }

    pub fn send_query(self, query: &str) -> SendResult {
        self.dispatch("send_query", |driver, adaptee, cache| {
            driver.map_query(adaptee, cache, query)
        })
    }

    pub fn send_query_params(self, command: &str, params: &QueryParams<'_>) -> SendResult {
        self.dispatch("send_query_params", |driver, adaptee, cache| {
            driver.map_query_params(adaptee, cache, command, params)
        })
    }

    pub fn send_query_prepared(self, stmt_name: &str, params: &QueryParams<'_>) -> SendResult {
        self.dispatch("send_query_prepared", |driver, adaptee, cache| {
            driver.send_prepared(adaptee, cache, stmt_name, params)
        })
    }

    pub fn send_prepare(self, stmt_name: &str, query: &str, param_types: &[Oid]) -> SendResult {
        self.dispatch("send_prepare", |driver, adaptee, cache| {
            driver.send_prepare(adaptee, cache, stmt_name, query, param_types)
        })
    }

    fn dispatch<F>(self, entry: &str, send: F) -> SendResult
    where
        F: FnOnce(&mut dyn Driver, &mut dyn ClientLibrary, &mut ValuesCache) -> SendResult,
    {
        match self.handle {
            Some(handle) => {
                let (driver, cache) = handle.split();
                let sent = send(driver, self.adaptee, cache);
                if sent.is_ok() {
                    handle.query_sent();
                }
                sent
            }
            None => {
                if self.warn_unconfigured {
                    report_unconfigured(entry);
                }
                send(&mut PassThroughDriver, self.adaptee, &mut ValuesCache::new())
            }
        }
    }
}

/// Configuration warning for a connection running without a driver.
pub(crate) fn report_unconfigured(entry: &str) {
    PassThroughDriver.report_error(&format!(
        "{}: no encryption driver is initialized for this connection; \
         values are sent and returned unmapped. Check the driver configuration.",
        entry
    ));
}
