//! Built-in entities describing the physical topology.

use crate::schema::{BucketStatus, StorageClass, StorageDriver};

crate::entity! {
    /// A physical backend endpoint.
    pub struct Storage {
        pub storage_class: StorageClass,
        pub driver: StorageDriver,
        pub dsn: String,
    }
}

impl Storage {
    pub fn new(
        id: u64,
        storage_class: StorageClass,
        driver: StorageDriver,
        dsn: impl Into<String>,
    ) -> Self {
        Self {
            id,
            storage_class,
            driver,
            dsn: dsn.into(),
        }
    }

    /// Process-local storage used when none is configured.
    pub fn in_memory(id: u64) -> Self {
        Self::new(id, StorageClass::Memory, StorageDriver::Memory, "")
    }
}

crate::entity! {
    /// One logical partition of a repository's data.
    ///
    /// `storage_id == 0` means no storage has been assigned yet.
    pub struct Bucket {
        pub key: String = String::new(),
        pub repository: String,
        pub status: BucketStatus = BucketStatus::New,
        pub storage_id: u64 = 0,
    }
}

impl Bucket {
    pub fn has_storage(&self) -> bool {
        self.storage_id != 0
    }
}
