use shardgate_commons::{StorageDriver, ValueError};
use thiserror::Error;

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by drivers and remote stores.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No row matched a lookup that required one
    #[error("{0} not found")]
    NotFound(String),

    /// No index covers the key set of a query
    #[error("No index on {space} for [{}]", .keys.join(","))]
    IndexNotFound { space: String, keys: Vec<String> },

    /// Space missing from the remote schema snapshot
    #[error("Invalid space {0}")]
    SpaceNotFound(String),

    #[error("{0} driver not implemented")]
    DriverNotImplemented(StorageDriver),

    /// Unique constraint violation (for indexes)
    #[error("Unique constraint violation: {0}")]
    UniqueConstraintViolation(String),

    /// Connection, protocol or server-side failure
    #[error("Backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Value(#[from] ValueError),
}
