use super::defaults::*;
use serde::{Deserialize, Serialize};
use shardgate_commons::{Storage, StorageClass, StorageDriver};
use std::collections::HashMap;

/// Top-level gateway configuration.
///
/// ```toml
/// [[storages]]
/// id = 1
/// storage_class = "hot"
/// driver = "remote"
/// dsn = "127.0.0.1:3301"
///
/// [remote]
/// page_size = 5000
/// max_concurrency = 2
///
/// [logging]
/// level = "info"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayConfig {
    /// Physical backends. Storage id 1 is the primary (bootstrap) storage.
    #[serde(default = "default_storages")]
    pub storages: Vec<StorageSettings>,
    #[serde(default)]
    pub remote: RemoteSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            storages: default_storages(),
            remote: RemoteSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

fn default_storages() -> Vec<StorageSettings> {
    vec![StorageSettings::default()]
}

/// One `[[storages]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageSettings {
    pub id: u64,
    #[serde(default = "default_storage_class")]
    pub storage_class: StorageClass,
    #[serde(default = "default_storage_driver")]
    pub driver: StorageDriver,
    #[serde(default)]
    pub dsn: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            id: default_primary_storage_id(),
            storage_class: default_storage_class(),
            driver: default_storage_driver(),
            dsn: String::new(),
        }
    }
}

impl StorageSettings {
    pub fn to_storage(&self) -> Storage {
        Storage::new(self.id, self.storage_class, self.driver, self.dsn.clone())
    }
}

/// Tuning of the remote driver's partitioned find.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteSettings {
    /// Index probes sent per batched select
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Upper bound on concurrent select workers per find
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional per-target log level overrides
    /// [logging.targets]
    /// shardgate_store = "debug"
    #[serde(default)]
    pub targets: HashMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            targets: HashMap::new(),
        }
    }
}
