use crate::driver::Driver;
use crate::error::{Result, StoreError};
use crate::memory::MemoryDriver;
use crate::remote::{RemoteConnector, RemoteDriver};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shardgate_commons::{Storage, StorageDriver};
use shardgate_configs::RemoteSettings;
use std::sync::Arc;

/// Process-scoped cache of driver instances keyed by (kind, dsn).
///
/// Resolving the same pair twice returns the same `Arc`, so every storage
/// sharing a dsn shares one driver and its caches.
pub struct DriverPool {
    drivers: DashMap<(StorageDriver, String), Arc<dyn Driver>>,
    connector: Option<Arc<dyn RemoteConnector>>,
    settings: RemoteSettings,
}

impl DriverPool {
    pub fn new(settings: RemoteSettings) -> Self {
        Self {
            drivers: DashMap::new(),
            connector: None,
            settings,
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn RemoteConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn settings(&self) -> &RemoteSettings {
        &self.settings
    }

    pub fn for_storage(&self, storage: &Storage) -> Result<Arc<dyn Driver>> {
        self.get(storage.driver, &storage.dsn)
    }

    pub fn get(&self, kind: StorageDriver, dsn: &str) -> Result<Arc<dyn Driver>> {
        match self.drivers.entry((kind, dsn.to_string())) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let driver = self.build(kind, dsn)?;
                log::debug!("Created {} driver for '{}'", kind, dsn);
                entry.insert(Arc::clone(&driver));
                Ok(driver)
            }
        }
    }

    fn build(&self, kind: StorageDriver, dsn: &str) -> Result<Arc<dyn Driver>> {
        match kind {
            StorageDriver::Memory => Ok(Arc::new(MemoryDriver::new(dsn))),
            StorageDriver::Remote => {
                let connector = self
                    .connector
                    .as_ref()
                    .ok_or(StoreError::DriverNotImplemented(kind))?;
                let store = connector.connect(dsn)?;
                Ok(Arc::new(RemoteDriver::new(dsn, store, self.settings)))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MemoryRemoteConnector;

    #[test]
    fn test_same_dsn_same_driver() {
        let pool = DriverPool::new(RemoteSettings::default());
        let a = pool.get(StorageDriver::Memory, "1").unwrap();
        let b = pool.get(StorageDriver::Memory, "1").unwrap();
        let c = pool.get(StorageDriver::Memory, "2").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_remote_without_connector() {
        let pool = DriverPool::new(RemoteSettings::default());
        let err = pool.get(StorageDriver::Remote, "db:3301").err().unwrap();
        assert_eq!(err, StoreError::DriverNotImplemented(StorageDriver::Remote));
    }

    #[test]
    fn test_remote_with_connector() {
        let pool = DriverPool::new(RemoteSettings::default())
            .with_connector(Arc::new(MemoryRemoteConnector::default()));
        let driver = pool.get(StorageDriver::Remote, "db:3301").unwrap();
        assert_eq!(driver.kind(), StorageDriver::Remote);
    }
}
