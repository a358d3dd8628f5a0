//! Intercepted connection.
//!
//! `Connection` exposes the same entry points as the wrapped client
//! library. Submissions go through `QueryInterceptor`; fetched results go
//! through the configured `ResultMapper`; the terminal null result drains
//! the driver's values cache.

use crate::adaptee::{ClientLibrary, ConnStatus, Oid, QueryParams, SendResult};
use crate::config::InterceptorConfig;
use crate::driver::{DriverFactory, DriverHandle, QueryState};
use crate::error::ClientError;
use crate::interceptor::{QueryInterceptor, report_unconfigured};
use crate::mapper::{ResultMapper, mapper_for};
use crate::result::{ExecStatus, ResultSet};

pub struct Connection<C: ClientLibrary> {
    // Declared before `client` so it is dropped (freed) first.
    handle: Option<DriverHandle>,
    client: C,
    mapper: Box<dyn ResultMapper>,
    config: InterceptorConfig,
    warned_unconfigured: bool,
}

impl<C: ClientLibrary> Connection<C> {
    /// Wrap an established client and open a driver for it.
    ///
    /// No driver is opened for a failed connection. If the factory fails
    /// the connection still works, unmapped.
    pub fn open(client: C, factory: &dyn DriverFactory, config: InterceptorConfig) -> Self {
        let handle = match client.status() {
            ConnStatus::Bad => None,
            ConnStatus::Ok | ConnStatus::Started => {
                match DriverHandle::open(factory, client.database_name()) {
                    Ok(handle) => Some(handle),
                    Err(err) => {
                        tracing::warn!(
                            database = client.database_name(),
                            "driver initialization failed: {}",
                            err
                        );
                        None
                    }
                }
            }
        };
        Self::with_handle(client, handle, config)
    }

    /// Wrap a client without a driver: every call passes straight through.
    pub fn unwrapped(client: C, config: InterceptorConfig) -> Self {
        Self::with_handle(client, None, config)
    }

    fn with_handle(client: C, handle: Option<DriverHandle>, config: InterceptorConfig) -> Self {
        Self {
            handle,
            client,
            mapper: mapper_for(config.strategy),
            config,
            warned_unconfigured: false,
        }
    }

    pub fn status(&self) -> ConnStatus {
        self.client.status()
    }

    pub fn has_driver(&self) -> bool {
        self.handle.is_some()
    }

    pub fn driver_handle(&self) -> Option<&DriverHandle> {
        self.handle.as_ref()
    }

    /// Current query lifecycle state, if a driver is attached.
    pub fn query_state(&self) -> Option<QueryState> {
        self.handle.as_ref().map(DriverHandle::state)
    }

    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// True on the first use of a driverless connection, when warnings are on.
    fn first_unconfigured_use(&mut self) -> bool {
        let warn = self.handle.is_none() && self.config.warn_unconfigured && !self.warned_unconfigured;
        if warn {
            self.warned_unconfigured = true;
        }
        warn
    }

    fn interceptor(&mut self) -> QueryInterceptor<'_> {
        let warn = self.first_unconfigured_use();
        QueryInterceptor::new(&mut self.client, self.handle.as_mut()).warn_unconfigured(warn)
    }

    pub fn send_query(&mut self, query: &str) -> SendResult {
        self.interceptor().send_query(query)
    }

    pub fn send_query_params(&mut self, command: &str, params: &QueryParams<'_>) -> SendResult {
        self.interceptor().send_query_params(command, params)
    }

    pub fn send_query_prepared(&mut self, stmt_name: &str, params: &QueryParams<'_>) -> SendResult {
        self.interceptor().send_query_prepared(stmt_name, params)
    }

    pub fn send_prepare(&mut self, stmt_name: &str, query: &str, param_types: &[Oid]) -> SendResult {
        self.interceptor().send_prepare(stmt_name, query, param_types)
    }

    /// Fetch the next result, mapped. `None` once the query is drained.
    ///
    /// A mapping that cannot allocate its scratch space yields a
    /// `FatalError` result instead of a partially mapped one.
    pub fn get_result(&mut self) -> Option<ResultSet> {
        let Some(result) = self.client.get_result() else {
            if let Some(handle) = self.handle.as_mut() {
                handle.drain();
            }
            return None;
        };

        if self.first_unconfigured_use() {
            report_unconfigured("get_result");
        }
        let Some(handle) = self.handle.as_mut() else {
            return Some(result);
        };
        handle.result_fetched();

        if result.column_count() == 0 && !self.config.map_empty_results {
            return Some(result);
        }

        let (driver, cache) = handle.split();
        match self.mapper.map(driver, cache, result) {
            Ok(mapped) => Some(mapped),
            Err(err) => {
                let message = err.to_string();
                handle.report_error(&message);
                Some(ResultSet::failed(ExecStatus::FatalError, message))
            }
        }
    }

    /// Send `query` and collect every result until the terminal null.
    pub fn query(&mut self, query: &str) -> Result<Vec<ResultSet>, ClientError> {
        self.send_query(query)?;
        Ok(std::iter::from_fn(|| self.get_result()).collect())
    }

    /// Run a statement through the adaptee, bypassing interception, and
    /// discard its result.
    pub fn exec_unmapped(&mut self, query: &str) -> Result<(), ClientError> {
        self.client.exec(query).map(drop)
    }

    /// Free the driver, then hand back the underlying client.
    pub fn close(self) -> C {
        let Connection { handle, client, .. } = self;
        if let Some(handle) = handle {
            handle.close();
        }
        client
    }
}
