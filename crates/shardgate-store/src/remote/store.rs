//! Capability surface of the remote tuple store.
//!
//! A space is the remote counterpart of an entity: a named tuple collection
//! with a positional format and an ordered list of indexes, the first of which
//! is the primary index.

use crate::error::Result;
use async_trait::async_trait;
use shardgate_commons::Value;
use std::fmt;
use std::sync::Arc;

/// Positional record as stored remotely.
pub type Tuple = Vec<Value>;

/// Primitive column types understood by the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteType {
    Unsigned,
    Number,
    String,
}

impl RemoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteType::Unsigned => "unsigned",
            RemoteType::Number => "number",
            RemoteType::String => "string",
        }
    }
}

impl fmt::Display for RemoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFormat {
    pub name: String,
    pub ty: RemoteType,
}

impl FieldFormat {
    pub fn new(name: impl Into<String>, ty: RemoteType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    pub name: String,
    /// Indexed columns in key order
    pub parts: Vec<FieldFormat>,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceMeta {
    pub name: String,
    /// Empty until a format has been set
    pub format: Vec<FieldFormat>,
    /// Creation order; the first entry is the primary index
    pub indexes: Vec<IndexMeta>,
}

impl SpaceMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn index(&self, name: &str) -> Option<&IndexMeta> {
        self.indexes.iter().find(|index| index.name == name)
    }

    pub fn primary(&self) -> Option<&IndexMeta> {
        self.indexes.first()
    }

    pub fn position(&self, field: &str) -> Option<usize> {
        self.format.iter().position(|f| f.name == field)
    }
}

/// Operations the remote driver needs from a tuple store connection.
///
/// Implementations must be shareable across tasks: the partitioned find
/// issues concurrent `select_batch` calls on one handle.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn connect(&self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Current snapshot of every user space.
    async fn fetch_schema(&self) -> Result<Vec<SpaceMeta>>;

    /// Create an empty space. No-op when it already exists.
    async fn create_space(&self, space: &str) -> Result<()>;

    async fn set_format(&self, space: &str, format: &[FieldFormat]) -> Result<()>;

    /// Create an index over named columns of the current format.
    async fn create_index(&self, space: &str, name: &str, parts: &[String], unique: bool)
        -> Result<()>;

    async fn insert(&self, space: &str, tuple: Tuple) -> Result<Tuple>;

    /// Insert or overwrite the tuple with the same primary key.
    async fn replace(&self, space: &str, tuple: Tuple) -> Result<Tuple>;

    /// Tuples whose leading index parts equal `key`. An empty key selects all.
    async fn select(&self, space: &str, index: &str, key: &[Value]) -> Result<Vec<Tuple>>;

    /// Evaluate several index probes in one round trip.
    ///
    /// Returns one entry per probe that matched at least one tuple.
    async fn select_batch(&self, space: &str, index: &str, keys: &[Tuple]) -> Result<Vec<Vec<Tuple>>>;

    async fn sequence_exists(&self, name: &str) -> Result<bool>;

    /// Create a sequence whose first value is `start`. No-op when it exists.
    async fn create_sequence(&self, name: &str, start: i64) -> Result<()>;

    async fn sequence_next(&self, name: &str) -> Result<i64>;
}

/// Turns a storage dsn into a store handle.
pub trait RemoteConnector: Send + Sync {
    fn connect(&self, dsn: &str) -> Result<Arc<dyn RemoteStore>>;
}
