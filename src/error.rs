//! Error types for pqext.
//!
//! Nothing in the interception layer is process-fatal. Driver-side failures
//! degrade toward pass-through; only native client errors and allocation
//! failures ever reach the caller.

use thiserror::Error;

/// A native error reported by the underlying client library.
///
/// Entry points propagate this unchanged: the interception layer never
/// rewrites, wraps or retries a failed underlying call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ClientError {
    /// SQLSTATE code, when the library reported one.
    pub sqlstate: Option<String>,
    pub message: String,
}

impl ClientError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            sqlstate: None,
            message: message.into(),
        }
    }

    pub fn with_sqlstate(sqlstate: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sqlstate: Some(sqlstate.into()),
            message: message.into(),
        }
    }
}

/// Errors raised by (or about) the external transformation driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// No driver could be created for the connection.
    #[error("Driver not initialized: {0}")]
    Uninitialized(String),

    /// The driver could not allocate its own scratch space.
    #[error("Driver allocation failure: {0}")]
    Allocation(String),

    /// The driver failed to transform a batch, or returned a malformed batch.
    #[error("Driver mapping failure: {0}")]
    Mapping(String),

    /// Clearing the per-query values cache failed.
    #[error("Failed to clear values cache: {0}")]
    CacheClear(String),

    /// The driver refused to send a query.
    #[error("Query rejected by driver: {0}")]
    Rejected(String),
}

impl From<DriverError> for ClientError {
    /// Driver-originated send failures carry no SQLSTATE; native errors
    /// never pass through this conversion.
    fn from(err: DriverError) -> Self {
        ClientError::new(err.to_string())
    }
}

/// Outcome of a mapping call that must be surfaced as a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    /// Scratch space for the mapping batch could not be allocated.
    #[error("Unable to allocate memory while mapping {cells} result cells")]
    Allocation { cells: usize },
}

/// Crate-level error for configuration, fixtures and tooling.
#[derive(Debug, Error)]
pub enum PqExtError {
    /// Underlying client library error.
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// Driver error.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed configuration file.
    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed replay fixture.
    #[error("Invalid fixture: {0}")]
    Fixture(#[from] serde_json::Error),

    /// A fixture row did not match its column list.
    #[error("Invalid result shape: {0}")]
    Shape(#[from] crate::result::ShapeError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for pqext operations.
pub type PqExtResult<T> = Result<T, PqExtError>;
