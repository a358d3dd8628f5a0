#![allow(dead_code)]

use pqext::prelude::*;
use pqext::replay::ReplayClient;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

pub fn bytes(v: &str) -> Option<Vec<u8>> {
    Some(v.as_bytes().to_vec())
}

/// Shared, ordered record of lifecycle events.
pub type Events = Rc<RefCell<Vec<String>>>;

pub fn events() -> Events {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn count(events: &Events, event: &str) -> usize {
    events.borrow().iter().filter(|e| *e == event).count()
}

/// A driver that records lifecycle calls and delegates mapping to an inner driver.
pub struct Recording<D: Driver> {
    pub inner: D,
    pub events: Events,
    pub fail_clear: bool,
}

impl<D: Driver> Recording<D> {
    pub fn new(inner: D, events: &Events) -> Self {
        Self {
            inner,
            events: Rc::clone(events),
            fail_clear: false,
        }
    }

    fn log(&self, event: &str) {
        self.events.borrow_mut().push(event.to_string());
    }
}

impl<D: Driver> Driver for Recording<D> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn map_result_in_place(
        &mut self,
        cache: &mut ValuesCache,
        cells: &mut CellViews<'_>,
    ) -> Result<InPlaceOutcome, DriverError> {
        self.log("map_in_place");
        self.inner.map_result_in_place(cache, cells)
    }

    fn map_result_rebuild(
        &mut self,
        cache: &mut ValuesCache,
        batch: &RebuildBatch<'_>,
    ) -> Result<RebuildOutput, DriverError> {
        self.log("map_rebuild");
        self.inner.map_result_rebuild(cache, batch)
    }

    fn clear_values_cache(&mut self, cache: &mut ValuesCache) -> Result<(), DriverError> {
        self.log("clear");
        if self.fail_clear {
            return Err(DriverError::CacheClear("cache store unavailable".into()));
        }
        self.inner.clear_values_cache(cache)
    }

    fn report_error(&self, message: &str) {
        self.log(&format!("error: {}", message));
    }

    fn close(&mut self) {
        self.log("close");
        self.inner.close();
    }
}

/// Open a connection whose single driver instance is `driver`.
pub fn connect<D: Driver + 'static>(
    client: ReplayClient,
    driver: D,
    strategy: MappingStrategy,
) -> Connection<ReplayClient> {
    let slot = RefCell::new(Some(driver));
    let factory = move |_: &str| -> Result<Box<dyn Driver>, DriverError> {
        match slot.borrow_mut().take() {
            Some(driver) => Ok(Box::new(driver)),
            None => Err(DriverError::Uninitialized("driver already taken".into())),
        }
    };
    let config = InterceptorConfig::builder().strategy(strategy).build();
    Connection::open(client, &factory, config)
}

pub fn client(columns: &[&str], rows: Vec<Vec<Cell>>) -> ReplayClient {
    ReplayClient::new("app", vec![ResultSet::from_rows(columns, rows).unwrap()])
}

/// Writer that appends formatted log lines to a shared buffer.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(mut lines) = self.0.lock() {
            lines.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a thread-local subscriber and return everything it logged.
pub fn capture_logs<F: FnOnce()>(f: F) -> String {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    tracing::subscriber::with_default(subscriber, f);

    let lines = buffer.0.lock().map(|b| b.clone()).unwrap_or_default();
    String::from_utf8_lossy(&lines).into_owned()
}
