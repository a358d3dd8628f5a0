//! # pqext: encryption-aware PostgreSQL client interception
//!
//! pqext sits between application code and a libpq-style client library.
//! Query text and bound parameters are routed through a transformation
//! driver before they are sent, and fetched results are routed back through
//! it before the caller sees them. With no driver configured every call is
//! a byte-for-byte pass-through.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use pqext::prelude::*;
//!
//! let config = InterceptorConfig::builder()
//!     .strategy(MappingStrategy::Rebuild)
//!     .build();
//! let mut conn = Connection::open(client, &my_driver_factory, config);
//!
//! conn.send_query("SELECT id, profile FROM users")?;
//! while let Some(result) = conn.get_result() {
//!     // `profile` may have been expanded into several plaintext columns
//! }
//! ```
//!
//! ## Mapping strategies
//!
//! | Strategy   | Shape            | Values        |
//! |------------|------------------|---------------|
//! | `in-place` | unchanged        | shrink only   |
//! | `rebuild`  | driver-defined   | any length    |

pub mod adaptee;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod interceptor;
pub mod mapper;
pub mod replay;
pub mod result;
pub mod schema;

pub mod prelude {
    pub use crate::adaptee::{ClientLibrary, ConnStatus, Format, Oid, QueryParams, SendResult};
    pub use crate::config::{InterceptorConfig, MappingStrategy};
    pub use crate::connection::Connection;
    pub use crate::driver::{Driver, DriverFactory, DriverHandle, QueryState, ValuesCache};
    pub use crate::error::*;
    pub use crate::mapper::{
        CellView, CellViews, InPlaceOutcome, RebuildBatch, RebuildOutput, ResultMapper,
    };
    pub use crate::result::{Cell, ExecStatus, ResultSet, Row};
    pub use crate::schema::{FieldDescriptor, Schema, SchemaAdjuster};
}

pub use connection::Connection;
pub use error::{PqExtError, PqExtResult};
