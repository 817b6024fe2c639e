use shardgate_commons::{entity, EntitySchema, Storage, StorageClass, StorageDriver};
use shardgate_registry::{IdentityMap, Registry, RegistryError, Repository};
use shardgate_store::StoreError;

entity! {
    pub struct Ticket {
        pub subject: String,
    }
}

entity! {
    pub struct Orphan {
        pub name: String,
    }
}

#[derive(Default)]
struct TicketRepository {
    map: IdentityMap,
}

impl Repository for TicketRepository {
    fn name(&self) -> &'static str {
        "TicketRepository"
    }

    fn entities(&self) -> Vec<EntitySchema> {
        vec![EntitySchema::of::<Ticket>()]
    }

    fn identity_map(&self) -> &IdentityMap {
        &self.map
    }
}

/// Claims `Ticket` under another name.
#[derive(Default)]
struct RivalRepository {
    map: IdentityMap,
}

impl Repository for RivalRepository {
    fn name(&self) -> &'static str {
        "RivalRepository"
    }

    fn entities(&self) -> Vec<EntitySchema> {
        vec![EntitySchema::of::<Ticket>()]
    }

    fn identity_map(&self) -> &IdentityMap {
        &self.map
    }
}

#[test]
fn test_duplicate_entity_owner() {
    let err = Registry::builder()
        .repository(TicketRepository::default())
        .repository(RivalRepository::default())
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, RegistryError::Configuration(msg) if msg.contains("Ticket")));
}

#[test]
fn test_duplicate_repository() {
    let err = Registry::builder()
        .repository(TicketRepository::default())
        .repository(TicketRepository::default())
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, RegistryError::Configuration(_)));
}

#[test]
fn test_duplicate_storage_id() {
    let err = Registry::builder()
        .storage(Storage::in_memory(1))
        .storage(Storage::new(1, StorageClass::Hot, StorageDriver::Memory, "other"))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, RegistryError::Configuration(msg) if msg.contains("storage id 1")));
}

#[tokio::test]
#[ntest::timeout(60000)]
async fn test_missing_primary_storage() {
    let registry = Registry::builder()
        .storage(Storage::in_memory(3))
        .repository(TicketRepository::default())
        .build()
        .unwrap();

    let err = registry.find::<Ticket>(&[], None).await.err().unwrap();
    assert!(matches!(err, RegistryError::PrimaryStorageNotFound));
}

#[tokio::test]
#[ntest::timeout(60000)]
async fn test_remote_storage_needs_connector() {
    let registry = Registry::builder()
        .storage(Storage::new(1, StorageClass::Hot, StorageDriver::Remote, "primary:3301"))
        .repository(TicketRepository::default())
        .build()
        .unwrap();

    let err = registry.bootstrap().await.err().unwrap();
    assert!(matches!(
        err,
        RegistryError::Store(StoreError::DriverNotImplemented(StorageDriver::Remote))
    ));

    // a failed bootstrap is retried, and fails the same way
    let err = registry.find::<Ticket>(&[], None).await.err().unwrap();
    assert!(matches!(err, RegistryError::Store(StoreError::DriverNotImplemented(_))));
}

#[tokio::test]
#[ntest::timeout(60000)]
async fn test_unknown_entity() {
    let registry = Registry::builder()
        .repository(TicketRepository::default())
        .build()
        .unwrap();

    let err = registry.find::<Orphan>(&[], None).await.err().unwrap();
    assert!(matches!(err, RegistryError::RepositoryNotFound(name) if name == "Orphan"));

    let err = registry.get_bucket("NoSuchRepository", None).await.err().unwrap();
    assert!(matches!(err, RegistryError::RepositoryNotFound(_)));
}

#[tokio::test]
#[ntest::timeout(60000)]
async fn test_lookup_helpers() {
    let registry = Registry::builder()
        .storage(Storage::in_memory(1))
        .storage(Storage::new(2, StorageClass::Hot, StorageDriver::Memory, "archive"))
        .repository(TicketRepository::default())
        .build()
        .unwrap();

    assert_eq!(registry.get_storage(2).unwrap().dsn, "archive");
    assert!(matches!(registry.get_storage(5), Err(RegistryError::StorageNotFound(5))));
    assert_eq!(registry.entity_repository("Ticket").unwrap().name(), "TicketRepository");
    assert_eq!(registry.entity_repository("Storage").unwrap().name(), "StorageRepository");
    assert_eq!(registry.entity_repository("Bucket").unwrap().name(), "BucketRepository");
}
