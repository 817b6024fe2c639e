//! Repositories own a set of entities, their secondary indexes and an
//! identity map.
//!
//! Every entity belongs to exactly one repository. The repository decides
//! which storage a new bucket lands on ([`Repository::cast_storage`]), how a
//! caller key maps to a bucket key ([`Repository::transform_key`]) and how a
//! fresh bucket is provisioned ([`Repository::init_schema`],
//! [`Repository::init_data`]).

use crate::error::{RegistryError, Result};
use crate::identity::{IdentityMap, Shared};
use async_trait::async_trait;
use shardgate_commons::{
    row, Bucket, BucketStatus, Entity, EntitySchema, Index, Storage, Value, BUCKET_ID, ID,
};
use shardgate_store::Driver;

/// Value stored in a bucket's `repository` column.
pub fn repository_ref(name: &str) -> Value {
    Value::Type(name.to_string())
}

#[async_trait]
pub trait Repository: Send + Sync + 'static {
    /// Unique repository name, stored on its buckets.
    fn name(&self) -> &'static str;

    /// Schemas of the owned entities, without indexes.
    fn entities(&self) -> Vec<EntitySchema>;

    fn indexes(&self) -> Vec<Index> {
        Vec::new()
    }

    fn identity_map(&self) -> &IdentityMap;

    /// Owned entity schemas with their declared indexes attached.
    fn schemas(&self) -> Vec<EntitySchema> {
        let indexes = self.indexes();
        self.entities()
            .into_iter()
            .map(|schema| schema.with_indexes(&indexes))
            .collect()
    }

    fn schema(&self, entity: &str) -> Option<EntitySchema> {
        self.schemas().into_iter().find(|schema| schema.name == entity)
    }

    /// Storage for a bucket that has none assigned yet.
    async fn cast_storage(&self, storages: &[Storage]) -> Result<Storage> {
        storages
            .first()
            .cloned()
            .ok_or_else(|| RegistryError::Configuration("No storages configured".to_string()))
    }

    /// Bucket key for a caller-supplied key.
    async fn transform_key(&self, _key: Option<&Value>) -> Result<String> {
        Ok(String::new())
    }

    async fn init_schema(&self, driver: &dyn Driver) -> Result<()> {
        for schema in self.schemas() {
            driver.init_schema(&schema).await?;
        }
        Ok(())
    }

    /// Seed a bucket after its schema exists. Must leave the bucket `ready`.
    async fn init_data(&self, bucket: &Shared<Bucket>, _driver: &dyn Driver) -> Result<()> {
        bucket.write().status = BucketStatus::Ready;
        Ok(())
    }
}

/// Owns [`Bucket`] rows. Meta bucket 1 holds every bucket row.
#[derive(Default)]
pub struct BucketRepository {
    map: IdentityMap,
}

impl BucketRepository {
    pub const NAME: &'static str = "BucketRepository";
    pub const BUCKET_ID: u64 = 1;

    /// Ensure the two meta bucket rows exist in the primary storage and map them.
    pub async fn bootstrap(&self, driver: &dyn Driver) -> Result<()> {
        let schema = self.bucket_schema();
        let meta = [
            (Self::BUCKET_ID, Self::NAME),
            (StorageRepository::BUCKET_ID, StorageRepository::NAME),
        ];

        for (id, repository) in meta {
            let query = row! { BUCKET_ID => Self::BUCKET_ID, ID => id };
            let mut data = Bucket {
                id,
                key: String::new(),
                repository: repository.to_string(),
                status: BucketStatus::Ready,
                storage_id: StorageRepository::PRIMARY_STORAGE_ID,
            }
            .to_row()
            .scoped(Self::BUCKET_ID);
            data.insert("repository", repository_ref(repository));

            let row = driver.find_or_create(&schema, &query, data).await?;
            self.map.make::<Bucket>(&row)?;
        }

        log::debug!("Meta buckets ready");
        Ok(())
    }

    pub fn bucket_schema(&self) -> EntitySchema {
        EntitySchema::of::<Bucket>().with_indexes(&self.indexes())
    }

    /// Meta bucket id reserved for `repository`, if it is a built-in one.
    pub fn meta_bucket_id(repository: &str) -> Option<u64> {
        match repository {
            Self::NAME => Some(Self::BUCKET_ID),
            StorageRepository::NAME => Some(StorageRepository::BUCKET_ID),
            _ => None,
        }
    }
}

#[async_trait]
impl Repository for BucketRepository {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn entities(&self) -> Vec<EntitySchema> {
        vec![EntitySchema::of::<Bucket>()]
    }

    fn indexes(&self) -> Vec<Index> {
        vec![Index::unique::<Bucket>(&["repository", "key"])]
    }

    fn identity_map(&self) -> &IdentityMap {
        &self.map
    }
}

/// Owns [`Storage`] rows, kept in meta bucket 2.
#[derive(Default)]
pub struct StorageRepository {
    map: IdentityMap,
}

impl StorageRepository {
    pub const NAME: &'static str = "StorageRepository";
    pub const BUCKET_ID: u64 = 2;
    pub const PRIMARY_STORAGE_ID: u64 = 1;

    /// Record the primary storage's own row in meta bucket 2.
    pub async fn bootstrap(&self, driver: &dyn Driver, storage: &Storage) -> Result<()> {
        if storage.id != Self::PRIMARY_STORAGE_ID {
            return Err(RegistryError::InvalidStorage(storage.id));
        }

        let schema = EntitySchema::of::<Storage>();
        let query = row! { BUCKET_ID => Self::BUCKET_ID, ID => storage.id };
        let row = driver
            .find_or_create(&schema, &query, storage.to_row().scoped(Self::BUCKET_ID))
            .await?;
        self.map.make::<Storage>(&row)?;
        Ok(())
    }
}

#[async_trait]
impl Repository for StorageRepository {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn entities(&self) -> Vec<EntitySchema> {
        vec![EntitySchema::of::<Storage>()]
    }

    fn identity_map(&self) -> &IdentityMap {
        &self.map
    }
}
