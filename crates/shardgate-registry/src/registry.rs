//! The gateway: resolves entities to buckets, storages and drivers.
//!
//! Every CRUD call goes through [`Registry::context`], which bootstraps the
//! registry on first use and walks the entity's bucket through its lifecycle:
//!
//! ```text
//!   new ──init_schema──▶ schema ──init_data──▶ ready
//! ```
//!
//! Each status advance and storage assignment is written back to the bucket's
//! row in meta bucket 1, so a restarted process resumes where it stopped.

use crate::error::{RegistryError, Result};
use crate::identity::Shared;
use crate::repository::{repository_ref, BucketRepository, Repository, StorageRepository};
use shardgate_commons::{
    row, Bucket, BucketStatus, Clause, Entity, EntitySchema, FieldValue, Row, Storage, Value,
    BUCKET_ID, ID,
};
use shardgate_configs::{GatewayConfig, RemoteSettings, StorageSettings};
use shardgate_store::{Driver, DriverPool, RemoteConnector};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Everything a CRUD call needs once an entity has been resolved.
pub struct QueryContext {
    pub bucket: Shared<Bucket>,
    pub driver: Arc<dyn Driver>,
    pub schema: EntitySchema,
    pub repository: Arc<dyn Repository>,
}

impl QueryContext {
    pub fn bucket_id(&self) -> u64 {
        self.bucket.read().id
    }
}

/// Explicit registration of repositories and storages.
pub struct RegistryBuilder {
    repositories: Vec<Arc<dyn Repository>>,
    storages: Vec<Storage>,
    settings: RemoteSettings,
    connector: Option<Arc<dyn RemoteConnector>>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            repositories: Vec::new(),
            storages: Vec::new(),
            settings: RemoteSettings::default(),
            connector: None,
        }
    }

    /// Builder seeded with the storages and remote settings of `config`.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new()
            .storages(config.storages.iter().map(StorageSettings::to_storage))
            .remote_settings(config.remote)
    }

    pub fn repository<R: Repository>(self, repository: R) -> Self {
        self.shared_repository(Arc::new(repository))
    }

    pub fn shared_repository(mut self, repository: Arc<dyn Repository>) -> Self {
        self.repositories.push(repository);
        self
    }

    pub fn storage(mut self, storage: Storage) -> Self {
        self.storages.push(storage);
        self
    }

    pub fn storages(mut self, storages: impl IntoIterator<Item = Storage>) -> Self {
        self.storages.extend(storages);
        self
    }

    pub fn remote_settings(mut self, settings: RemoteSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn connector(mut self, connector: Arc<dyn RemoteConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn build(self) -> Result<Registry> {
        let buckets = Arc::new(BucketRepository::default());
        let storage_repository = Arc::new(StorageRepository::default());

        let mut all: Vec<Arc<dyn Repository>> = Vec::with_capacity(self.repositories.len() + 2);
        all.push(buckets.clone());
        all.push(storage_repository.clone());
        all.extend(self.repositories);

        let mut repositories = HashMap::new();
        let mut owners = HashMap::new();
        for repository in all {
            let name = repository.name();
            for schema in repository.entities() {
                if owners.insert(schema.name, name).is_some() {
                    return Err(RegistryError::Configuration(format!(
                        "Duplicate entity repository: {}",
                        schema.name
                    )));
                }
            }
            if repositories.insert(name, repository).is_some() {
                return Err(RegistryError::Configuration(format!(
                    "Duplicate repository: {}",
                    name
                )));
            }
        }

        let storages = if self.storages.is_empty() {
            vec![Storage::in_memory(StorageRepository::PRIMARY_STORAGE_ID)]
        } else {
            self.storages
        };
        let mut seen = HashSet::new();
        for storage in &storages {
            if !seen.insert(storage.id) {
                return Err(RegistryError::Configuration(format!(
                    "Duplicate storage id {}",
                    storage.id
                )));
            }
        }

        let mut pool = DriverPool::new(self.settings);
        if let Some(connector) = self.connector {
            pool = pool.with_connector(connector);
        }

        log::debug!(
            "Registry built with {} repositories and {} storages",
            repositories.len(),
            storages.len()
        );

        Ok(Registry {
            repositories,
            owners,
            buckets,
            storage_repository,
            storages,
            pool,
            bootstrapped: OnceCell::new(),
        })
    }
}

/// Process-scoped gateway over all registered repositories and storages.
pub struct Registry {
    repositories: HashMap<&'static str, Arc<dyn Repository>>,
    /// entity name -> repository name
    owners: HashMap<&'static str, &'static str>,
    buckets: Arc<BucketRepository>,
    storage_repository: Arc<StorageRepository>,
    storages: Vec<Storage>,
    pool: DriverPool,
    bootstrapped: OnceCell<()>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Provision the meta buckets on the primary storage. Runs once; a failed
    /// attempt is retried on the next call.
    pub async fn bootstrap(&self) -> Result<()> {
        self.bootstrapped
            .get_or_try_init(|| async {
                let primary = self
                    .get_storage(StorageRepository::PRIMARY_STORAGE_ID)
                    .map_err(|_| RegistryError::PrimaryStorageNotFound)?;
                let driver = self.pool.for_storage(&primary)?;

                self.buckets.bootstrap(driver.as_ref()).await?;
                self.storage_repository.bootstrap(driver.as_ref(), &primary).await?;

                log::info!(
                    "Registry bootstrapped on storage {} ({} driver)",
                    primary.id,
                    primary.driver
                );
                Ok::<(), RegistryError>(())
            })
            .await?;
        Ok(())
    }

    pub fn storages(&self) -> &[Storage] {
        &self.storages
    }

    pub fn get_storage(&self, id: u64) -> Result<Storage> {
        self.storages
            .iter()
            .find(|storage| storage.id == id)
            .cloned()
            .ok_or(RegistryError::StorageNotFound(id))
    }

    /// Driver serving `storage`, shared with every storage on the same dsn.
    pub fn driver(&self, storage: &Storage) -> Result<Arc<dyn Driver>> {
        Ok(self.pool.for_storage(storage)?)
    }

    pub fn repository(&self, name: &str) -> Result<Arc<dyn Repository>> {
        self.repositories
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::RepositoryNotFound(name.to_string()))
    }

    /// Repository owning `entity`.
    pub fn entity_repository(&self, entity: &str) -> Result<Arc<dyn Repository>> {
        let name = self
            .owners
            .get(entity)
            .ok_or_else(|| RegistryError::RepositoryNotFound(entity.to_string()))?;
        self.repository(name)
    }

    /// Resolve `entity` under `key` to a ready bucket, its driver and schema.
    pub async fn context(&self, entity: &str, key: Option<&Value>) -> Result<QueryContext> {
        self.bootstrap().await?;

        let repository = self.entity_repository(entity)?;
        let schema = repository
            .schema(entity)
            .ok_or_else(|| RegistryError::RepositoryNotFound(entity.to_string()))?;
        let bucket = self.get_bucket(repository.name(), key).await?;

        let storage_id = bucket.read().storage_id;
        let storage = if storage_id == 0 {
            let candidate = repository.cast_storage(&self.storages).await?;
            let storage = self
                .get_storage(candidate.id)
                .map_err(|_| RegistryError::InvalidStorage(candidate.id))?;
            bucket.write().storage_id = storage.id;
            self.persist(&bucket).await?;
            storage
        } else {
            self.get_storage(storage_id)?
        };

        let driver = self.pool.for_storage(&storage)?;

        let status = bucket.read().status;
        if status == BucketStatus::New {
            repository.init_schema(driver.as_ref()).await?;
            bucket.write().status = BucketStatus::Schema;
            self.persist(&bucket).await?;
        }

        let status = bucket.read().status;
        if status == BucketStatus::Schema {
            repository.init_data(&bucket, driver.as_ref()).await?;
            let advanced = bucket.read().status != BucketStatus::Schema;
            if advanced {
                self.persist(&bucket).await?;
            }
        }

        let status = bucket.read().status;
        if status != BucketStatus::Ready {
            return Err(RegistryError::InvalidStatus(status));
        }

        Ok(QueryContext {
            bucket,
            driver,
            schema,
            repository,
        })
    }

    /// Bucket of `repository` for `key`, created with status `new` on first
    /// reference. Built-in repositories resolve to their meta buckets.
    pub async fn get_bucket(&self, repository: &str, key: Option<&Value>) -> Result<Shared<Bucket>> {
        self.bootstrap().await?;

        if let Some(id) = BucketRepository::meta_bucket_id(repository) {
            if let Some(bucket) = self.buckets.identity_map().get::<Bucket>(id) {
                return Ok(bucket);
            }
        }

        let owner = self.repository(repository)?;
        let key = owner.transform_key(key).await?;

        let schema = self.buckets.bucket_schema();
        let query = row! {
            BUCKET_ID => BucketRepository::BUCKET_ID,
            "key" => key,
            "repository" => repository_ref(repository),
        };
        let mut data = query.clone();
        data.insert("status", BucketStatus::New.to_value());
        schema.fill_defaults(&mut data);

        let row = self.meta_driver()?.find_or_create(&schema, &query, data).await?;
        self.buckets.identity_map().make::<Bucket>(&row)
    }

    /// Entities of type `E` matching any of `queries` within the bucket for
    /// `key`. No queries selects every entity in the bucket.
    pub async fn find<E: Entity>(&self, queries: &[Clause], key: Option<&Value>) -> Result<Vec<Shared<E>>> {
        let context = self.context(E::NAME, key).await?;
        let bucket_id = context.bucket_id();

        let scoped: Vec<Clause> = if queries.is_empty() {
            vec![Row::new().scoped(bucket_id)]
        } else {
            queries.iter().map(|query| query.scoped(bucket_id)).collect()
        };

        let rows = context.driver.find(&context.schema, &scoped, None).await?;
        rows.iter()
            .map(|row| context.repository.identity_map().make::<E>(row))
            .collect()
    }

    /// Insert a new entity; omitted fields take their defaults.
    pub async fn create<E: Entity>(&self, data: Row, key: Option<&Value>) -> Result<Shared<E>> {
        let context = self.context(E::NAME, key).await?;

        let mut data = data;
        context.schema.fill_defaults(&mut data);
        let row = context
            .driver
            .insert(&context.schema, data.scoped(context.bucket_id()))
            .await?;
        context.repository.identity_map().make::<E>(&row)
    }

    /// First entity matching `query` (default: `data` as given), else a new
    /// entity built from `data` plus defaults.
    pub async fn find_or_create<E: Entity>(
        &self,
        data: Row,
        query: Option<Clause>,
        key: Option<&Value>,
    ) -> Result<Shared<E>> {
        let context = self.context(E::NAME, key).await?;
        let bucket_id = context.bucket_id();

        let query = query.unwrap_or_else(|| data.clone());
        let mut data = data;
        context.schema.fill_defaults(&mut data);

        let row = context
            .driver
            .find_or_create(&context.schema, &query.scoped(bucket_id), data.scoped(bucket_id))
            .await?;
        context.repository.identity_map().make::<E>(&row)
    }

    pub async fn get_instance<E: Entity>(&self, id: u64, key: Option<&Value>) -> Result<Option<Shared<E>>> {
        let found = self.find::<E>(&[row! { ID => id }], key).await?;
        Ok(found.into_iter().next())
    }

    fn meta_driver(&self) -> Result<Arc<dyn Driver>> {
        let primary = self
            .get_storage(StorageRepository::PRIMARY_STORAGE_ID)
            .map_err(|_| RegistryError::PrimaryStorageNotFound)?;
        Ok(self.pool.for_storage(&primary)?)
    }

    /// Write the bucket's status and storage assignment back to its row.
    async fn persist(&self, bucket: &Shared<Bucket>) -> Result<()> {
        let (id, changes) = {
            let bucket = bucket.read();
            (
                bucket.id,
                row! {
                    "status" => bucket.status.to_value(),
                    "storage_id" => bucket.storage_id,
                },
            )
        };

        let query = row! { BUCKET_ID => BucketRepository::BUCKET_ID, ID => id };
        let updated = self
            .meta_driver()?
            .update(&self.buckets.bucket_schema(), &query, &changes)
            .await?;
        if updated.is_empty() {
            log::warn!("Bucket {} has no stored row to persist into", id);
        } else {
            log::debug!("Persisted bucket {}: {}", id, changes);
        }
        Ok(())
    }
}
