use shardgate_commons::{StorageClass, StorageDriver};

// Default value functions
pub fn default_page_size() -> usize {
    5000 // probes per batched select round trip
}

pub fn default_max_concurrency() -> usize {
    2
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_storage_class() -> StorageClass {
    StorageClass::Memory
}

pub fn default_storage_driver() -> StorageDriver {
    StorageDriver::Memory
}

pub fn default_primary_storage_id() -> u64 {
    1
}
