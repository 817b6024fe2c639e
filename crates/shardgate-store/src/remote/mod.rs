//! Driver for a networked tuple store.
//!
//! The wire protocol is not implemented here: the driver consumes the
//! [`RemoteStore`] capability, and a [`RemoteConnector`] turns a storage dsn
//! into a store handle.

pub mod coerce;
pub mod constructor;
pub mod driver;
pub mod format;
pub mod store;

pub use constructor::RowConstructor;
pub use driver::RemoteDriver;
pub use store::{FieldFormat, IndexMeta, RemoteConnector, RemoteStore, RemoteType, SpaceMeta, Tuple};
