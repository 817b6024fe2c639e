//! Bucket lifecycle tests.
//!
//! - schema and data initialisation run once per bucket
//! - keyed repositories get one bucket per key, on the storage they pick
//! - a bucket that never reaches `ready` is rejected
//! - storage assignment is validated against the configured storages
//! - a registry restarted over the same store resumes stored bucket status

use async_trait::async_trait;
use shardgate_commons::{
    entity, row, Bucket, BucketStatus, Entity, EntitySchema, Storage, StorageClass, StorageDriver,
    Value,
};
use shardgate_registry::{IdentityMap, Registry, RegistryError, Repository, Result, Shared};
use shardgate_store::test_utils::MemoryRemoteConnector;
use shardgate_store::Driver;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

entity! {
    pub struct Counter {
        pub label: String,
    }
}

entity! {
    pub struct Note {
        pub body: String,
        pub weight: f64 = 1.0,
    }
}

entity! {
    pub struct Draft {
        pub title: String,
    }
}

entity! {
    pub struct Misplaced {
        pub label: String,
    }
}

fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .is_test(true)
        .try_init();
}

/// Seeds one row on data initialisation and counts both phases.
#[derive(Default)]
struct CountingRepository {
    map: IdentityMap,
    schema_inits: AtomicUsize,
    data_inits: AtomicUsize,
}

#[async_trait]
impl Repository for CountingRepository {
    fn name(&self) -> &'static str {
        "CountingRepository"
    }

    fn entities(&self) -> Vec<EntitySchema> {
        vec![EntitySchema::of::<Counter>()]
    }

    fn identity_map(&self) -> &IdentityMap {
        &self.map
    }

    async fn init_schema(&self, driver: &dyn Driver) -> Result<()> {
        self.schema_inits.fetch_add(1, Ordering::SeqCst);
        for schema in self.schemas() {
            driver.init_schema(&schema).await?;
        }
        Ok(())
    }

    async fn init_data(&self, bucket: &Shared<Bucket>, driver: &dyn Driver) -> Result<()> {
        self.data_inits.fetch_add(1, Ordering::SeqCst);
        let bucket_id = bucket.read().id;
        driver
            .insert(
                &EntitySchema::of::<Counter>(),
                row! { "label" => "seed" }.scoped(bucket_id),
            )
            .await?;
        bucket.write().status = BucketStatus::Ready;
        Ok(())
    }
}

/// One bucket per tenant key, always on the last configured storage.
#[derive(Default)]
struct TenantRepository {
    map: IdentityMap,
}

#[async_trait]
impl Repository for TenantRepository {
    fn name(&self) -> &'static str {
        "TenantRepository"
    }

    fn entities(&self) -> Vec<EntitySchema> {
        vec![EntitySchema::of::<Note>()]
    }

    fn identity_map(&self) -> &IdentityMap {
        &self.map
    }

    async fn cast_storage(&self, storages: &[Storage]) -> Result<Storage> {
        storages
            .last()
            .cloned()
            .ok_or_else(|| RegistryError::Configuration("no storages".to_string()))
    }

    async fn transform_key(&self, key: Option<&Value>) -> Result<String> {
        Ok(match key {
            Some(key) => format!("tenant-{}", key),
            None => String::new(),
        })
    }
}

/// Leaves its buckets in `schema`.
#[derive(Default)]
struct StuckRepository {
    map: IdentityMap,
}

#[async_trait]
impl Repository for StuckRepository {
    fn name(&self) -> &'static str {
        "StuckRepository"
    }

    fn entities(&self) -> Vec<EntitySchema> {
        vec![EntitySchema::of::<Draft>()]
    }

    fn identity_map(&self) -> &IdentityMap {
        &self.map
    }

    async fn init_data(&self, _bucket: &Shared<Bucket>, _driver: &dyn Driver) -> Result<()> {
        Ok(())
    }
}

/// Picks a storage that is not configured.
#[derive(Default)]
struct MisplacedRepository {
    map: IdentityMap,
}

#[async_trait]
impl Repository for MisplacedRepository {
    fn name(&self) -> &'static str {
        "MisplacedRepository"
    }

    fn entities(&self) -> Vec<EntitySchema> {
        vec![EntitySchema::of::<Misplaced>()]
    }

    fn identity_map(&self) -> &IdentityMap {
        &self.map
    }

    async fn cast_storage(&self, _storages: &[Storage]) -> Result<Storage> {
        Ok(Storage::in_memory(9))
    }
}

fn two_storages() -> Vec<Storage> {
    vec![
        Storage::new(1, StorageClass::Hot, StorageDriver::Memory, "primary"),
        Storage::new(2, StorageClass::Memory, StorageDriver::Memory, "tenants"),
    ]
}

async fn stored_bucket(registry: &Registry, id: u64) -> Bucket {
    let driver = registry.driver(&registry.get_storage(1).unwrap()).unwrap();
    let schema = registry
        .entity_repository(Bucket::NAME)
        .unwrap()
        .schema(Bucket::NAME)
        .unwrap();
    let row = driver
        .find_or_fail(&schema, &[row! { "bucket_id" => 1, "id" => id }])
        .await
        .unwrap();
    Bucket::from_row(&row).unwrap()
}

#[tokio::test]
#[ntest::timeout(60000)]
async fn test_bucket_initialised_once() {
    init_logger();
    let repository = Arc::new(CountingRepository::default());
    let registry = Registry::builder()
        .shared_repository(repository.clone())
        .build()
        .unwrap();

    let mut bucket_ids = Vec::new();
    for _ in 0..3 {
        let counters = registry.find::<Counter>(&[], None).await.unwrap();
        assert_eq!(counters.len(), 1);
        assert_eq!(counters[0].read().label, "seed");

        let context = registry.context(Counter::NAME, None).await.unwrap();
        bucket_ids.push(context.bucket_id());
    }

    assert_eq!(repository.schema_inits.load(Ordering::SeqCst), 1);
    assert_eq!(repository.data_inits.load(Ordering::SeqCst), 1);
    assert!(bucket_ids.iter().all(|id| *id == bucket_ids[0]));

    let stored = stored_bucket(&registry, bucket_ids[0]).await;
    assert_eq!(stored.status, BucketStatus::Ready);
    assert_eq!(stored.storage_id, 1);
}

#[tokio::test]
#[ntest::timeout(60000)]
async fn test_keyed_buckets_are_isolated() {
    init_logger();
    let registry = Registry::builder()
        .storages(two_storages())
        .repository(TenantRepository::default())
        .build()
        .unwrap();

    let seven = Value::Int(7);
    let eight = Value::Int(8);

    registry
        .create::<Note>(row! { "body" => "for seven" }, Some(&seven))
        .await
        .unwrap();
    registry
        .create::<Note>(row! { "body" => "also seven" }, Some(&seven))
        .await
        .unwrap();
    registry
        .create::<Note>(row! { "body" => "for eight" }, Some(&eight))
        .await
        .unwrap();

    assert_eq!(registry.find::<Note>(&[], Some(&seven)).await.unwrap().len(), 2);
    let notes = registry.find::<Note>(&[], Some(&eight)).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].read().body, "for eight");
    assert_eq!(notes[0].read().weight, 1.0);

    let bucket = registry
        .get_bucket("TenantRepository", Some(&seven))
        .await
        .unwrap();
    assert_eq!(bucket.read().key, "tenant-7");
    assert_eq!(bucket.read().storage_id, 2);

    // rows live on the tenant storage, not on the primary one
    let schema = EntitySchema::of::<Note>();
    let tenants = registry.driver(&registry.get_storage(2).unwrap()).unwrap();
    let primary = registry.driver(&registry.get_storage(1).unwrap()).unwrap();
    assert_eq!(tenants.find(&schema, &[row! {}], None).await.unwrap().len(), 3);
    assert!(primary.find(&schema, &[row! {}], None).await.unwrap().is_empty());

    let stored = stored_bucket(&registry, bucket.read().id).await;
    assert_eq!(stored.storage_id, 2);
}

#[tokio::test]
#[ntest::timeout(60000)]
async fn test_bucket_that_never_becomes_ready() {
    init_logger();
    let registry = Registry::builder()
        .repository(StuckRepository::default())
        .build()
        .unwrap();

    let err = registry.find::<Draft>(&[], None).await.err().unwrap();
    assert!(matches!(err, RegistryError::InvalidStatus(BucketStatus::Schema)));

    let bucket = registry.get_bucket("StuckRepository", None).await.unwrap();
    let bucket_id = bucket.read().id;
    assert_eq!(stored_bucket(&registry, bucket_id).await.status, BucketStatus::Schema);

    // the guard holds on every call
    let err = registry.create::<Draft>(row! { "title" => "x" }, None).await.err().unwrap();
    assert!(matches!(err, RegistryError::InvalidStatus(BucketStatus::Schema)));
}

#[tokio::test]
#[ntest::timeout(60000)]
async fn test_cast_storage_must_be_configured() {
    init_logger();
    let registry = Registry::builder()
        .repository(MisplacedRepository::default())
        .build()
        .unwrap();

    let err = registry.find::<Misplaced>(&[], None).await.err().unwrap();
    assert!(matches!(err, RegistryError::InvalidStorage(9)));
}

#[tokio::test]
#[ntest::timeout(60000)]
async fn test_meta_buckets_resolve_from_identity_map() {
    init_logger();
    let registry = Registry::builder().build().unwrap();

    let buckets = registry.get_bucket("BucketRepository", None).await.unwrap();
    let storages = registry.get_bucket("StorageRepository", None).await.unwrap();
    assert_eq!(buckets.read().id, 1);
    assert_eq!(storages.read().id, 2);
    assert_eq!(storages.read().status, BucketStatus::Ready);

    let primary = registry.find::<Storage>(&[], None).await.unwrap();
    assert_eq!(primary.len(), 1);
    assert_eq!(*primary[0].read(), Storage::in_memory(1));

    let all = registry.find::<Bucket>(&[], None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(Arc::ptr_eq(&all[0], &buckets));
}

#[tokio::test]
#[ntest::timeout(60000)]
async fn test_restart_resumes_stored_bucket_status() {
    init_logger();
    let connector = Arc::new(MemoryRemoteConnector::default());
    let primary = Storage::new(1, StorageClass::Hot, StorageDriver::Remote, "tcp://durable:3301");

    let first = Arc::new(CountingRepository::default());
    let registry = Registry::builder()
        .storage(primary.clone())
        .connector(connector.clone())
        .shared_repository(first.clone())
        .build()
        .unwrap();
    assert_eq!(registry.find::<Counter>(&[], None).await.unwrap().len(), 1);
    let bucket_id = registry.context(Counter::NAME, None).await.unwrap().bucket_id();
    drop(registry);

    // a fresh process: new registry, new repository, same remote store
    let second = Arc::new(CountingRepository::default());
    let restarted = Registry::builder()
        .storage(primary)
        .connector(connector.clone())
        .shared_repository(second.clone())
        .build()
        .unwrap();

    let bucket = restarted.get_bucket("CountingRepository", None).await.unwrap();
    assert_eq!(bucket.read().id, bucket_id);
    assert_eq!(bucket.read().status, BucketStatus::Ready);
    assert_eq!(bucket.read().storage_id, 1);

    let counters = restarted.find::<Counter>(&[], None).await.unwrap();
    assert_eq!(counters.len(), 1);
    assert_eq!(counters[0].read().label, "seed");

    assert_eq!(first.schema_inits.load(Ordering::SeqCst), 1);
    assert_eq!(first.data_inits.load(Ordering::SeqCst), 1);
    assert_eq!(second.schema_inits.load(Ordering::SeqCst), 0);
    assert_eq!(second.data_inits.load(Ordering::SeqCst), 0);

    let store = connector.store("tcp://durable:3301");
    assert_eq!(store.tuples("Bucket").len(), 3);
    assert_eq!(store.tuples("Counter").len(), 1);
}
