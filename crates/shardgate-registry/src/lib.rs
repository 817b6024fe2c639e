//! Bucket registry for shardgate.
//!
//! Maps entities to buckets through their owning [`Repository`], assigns
//! buckets to storages, provisions them lazily, and hands out shared entity
//! instances deduplicated by per-repository [`IdentityMap`]s.

pub mod error;
pub mod identity;
pub mod registry;
pub mod repository;

pub use error::{RegistryError, Result};
pub use identity::{IdentityMap, Shared};
pub use registry::{QueryContext, Registry, RegistryBuilder};
pub use repository::{BucketRepository, Repository, StorageRepository};
