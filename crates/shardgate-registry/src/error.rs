use shardgate_commons::{BucketStatus, ValueError};
use shardgate_store::StoreError;
use thiserror::Error;

/// Errors raised while resolving buckets, storages and repositories.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Invalid registration or storage setup, detected at build time
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No entity repository found: {0}")]
    RepositoryNotFound(String),

    #[error("Primary storage not found")]
    PrimaryStorageNotFound,

    #[error("Storage {0} not found")]
    StorageNotFound(u64),

    /// Storage rejected by a repository (wrong id or not configured)
    #[error("Invalid storage_id: {0}")]
    InvalidStorage(u64),

    /// Bucket did not reach `ready` after initialisation
    #[error("Invalid status: {0}")]
    InvalidStatus(BucketStatus),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
