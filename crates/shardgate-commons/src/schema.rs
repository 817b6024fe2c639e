//! Enumerations shared by storages, buckets and entity field descriptors.

use crate::errors::ValueError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storage tier a physical backend belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageClass {
    /// Fast, durable primary tier
    Hot,
    /// Process memory only
    Memory,
}

impl StorageClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageClass::Hot => "hot",
            StorageClass::Memory => "memory",
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageClass {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hot" => Ok(StorageClass::Hot),
            "memory" => Ok(StorageClass::Memory),
            _ => Err(ValueError::UnknownVariant {
                kind: "storage class",
                value: s.to_string(),
            }),
        }
    }
}

/// Which driver implementation serves a storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageDriver {
    /// In-process reference driver
    Memory,
    /// Networked tuple store
    Remote,
}

impl StorageDriver {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageDriver::Memory => "memory",
            StorageDriver::Remote => "remote",
        }
    }
}

impl fmt::Display for StorageDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageDriver {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StorageDriver::Memory),
            "remote" => Ok(StorageDriver::Remote),
            _ => Err(ValueError::UnknownVariant {
                kind: "storage driver",
                value: s.to_string(),
            }),
        }
    }
}

/// Bucket lifecycle. Advances `New -> Schema -> Ready` and never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketStatus {
    New,
    Schema,
    Ready,
}

impl BucketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketStatus::New => "new",
            BucketStatus::Schema => "schema",
            BucketStatus::Ready => "ready",
        }
    }
}

impl fmt::Display for BucketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BucketStatus {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(BucketStatus::New),
            "schema" => Ok(BucketStatus::Schema),
            "ready" => Ok(BucketStatus::Ready),
            _ => Err(ValueError::UnknownVariant {
                kind: "bucket status",
                value: s.to_string(),
            }),
        }
    }
}

/// Domain-level type of an entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int,
    Float,
    Str,
    /// Enumeration stored by variant name
    Enum,
}
