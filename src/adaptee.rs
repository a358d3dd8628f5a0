//! The consumed client-library API.
//!
//! `ClientLibrary` mirrors the asynchronous submission entry points of
//! libpq (`PQsendQuery`, `PQsendQueryParams`, `PQsendQueryPrepared`,
//! `PQsendPrepare`, `PQgetResult`) plus a blocking `exec` used for
//! auxiliary statements. Implementations are the raw, uninterposed
//! library: calling them never re-enters the interception layer.

use crate::error::ClientError;
use crate::result::ResultSet;
use serde::Deserialize;

/// PostgreSQL object identifier (type OIDs, table OIDs).
pub type Oid = u32;

/// Outcome of a submission entry point.
pub type SendResult = Result<(), ClientError>;

/// Wire format of a parameter or result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Text,
    Binary,
}

impl Format {
    /// Protocol format code (0 = text, 1 = binary).
    pub fn code(self) -> i16 {
        match self {
            Format::Text => 0,
            Format::Binary => 1,
        }
    }
}

/// Connection status as reported by the underlying library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnStatus {
    Ok,
    /// Non-blocking connection still in progress (`PQconnectStart`).
    Started,
    Bad,
}

/// Borrowed view of a bound parameter list.
///
/// Empty `types` / `formats` slices carry the same meaning as a NULL array
/// in libpq: the server infers types and every parameter is text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryParams<'a> {
    pub types: &'a [Oid],
    pub values: &'a [Option<&'a [u8]>],
    pub formats: &'a [Format],
    pub result_format: Format,
}

impl<'a> QueryParams<'a> {
    /// Text parameters with inferred types and a text result.
    pub fn text(values: &'a [Option<&'a [u8]>]) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    pub fn with_types(mut self, types: &'a [Oid]) -> Self {
        self.types = types;
        self
    }

    pub fn with_formats(mut self, formats: &'a [Format]) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_result_format(mut self, result_format: Format) -> Self {
        self.result_format = result_format;
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The underlying client library ("adaptee").
///
/// Must stay object safe: drivers receive it as `&mut dyn ClientLibrary`.
pub trait ClientLibrary {
    fn status(&self) -> ConnStatus;

    /// Name of the database this connection targets.
    fn database_name(&self) -> &str;

    fn send_query(&mut self, query: &str) -> SendResult;

    fn send_query_params(&mut self, command: &str, params: &QueryParams<'_>) -> SendResult;

    /// Execute a named prepared statement. `params.types` is ignored.
    fn send_query_prepared(&mut self, stmt_name: &str, params: &QueryParams<'_>) -> SendResult;

    fn send_prepare(
        &mut self,
        stmt_name: &str,
        query: &str,
        param_types: &[Oid],
    ) -> SendResult;

    /// Next result of the current query, `None` once drained.
    fn get_result(&mut self) -> Option<ResultSet>;

    /// Submit a statement and wait for its last result.
    ///
    /// Used for a driver's own auxiliary statements (schema lookups and the
    /// like). Results returned here are never mapped.
    fn exec(&mut self, query: &str) -> Result<ResultSet, ClientError>;
}
