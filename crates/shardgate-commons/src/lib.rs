//! Shared domain model for the shard gateway.
//!
//! This crate holds the pieces every other crate speaks: dynamically typed
//! [`Value`]s and [`Row`]s, the [`Entity`] trait with its runtime
//! [`EntitySchema`], index declarations, and the built-in [`Storage`] and
//! [`Bucket`] entities.

pub mod entity;
pub mod errors;
pub mod index;
pub mod models;
pub mod row;
pub mod schema;
pub mod value;

pub use entity::{read_field, Entity, EntitySchema, FieldDef, FieldValue};
pub use errors::{Result as ValueResult, ValueError};
pub use index::Index;
pub use models::{Bucket, Storage};
pub use row::{Clause, Row, BUCKET_ID, ID};
pub use schema::{BucketStatus, FieldType, StorageClass, StorageDriver};
pub use value::Value;
