//! Storage drivers for shardgate.
//!
//! A [`Driver`] exposes the uniform find / insert / schema contract over one
//! physical storage. Two implementations ship with the crate:
//!
//! - [`MemoryDriver`]: process-local reference semantics
//! - [`RemoteDriver`]: a networked tuple store reached through the
//!   [`RemoteStore`] capability, with format/index synchronisation, typed
//!   coercion, sequence ids and concurrent partitioned find
//!
//! [`DriverPool`] caches one driver per (kind, dsn).

pub mod driver;
pub mod error;
pub mod memory;
pub mod pool;
pub mod remote;
pub mod test_utils;

pub use driver::Driver;
pub use error::{Result, StoreError};
pub use memory::MemoryDriver;
pub use pool::DriverPool;
pub use remote::{RemoteConnector, RemoteDriver, RemoteStore};
