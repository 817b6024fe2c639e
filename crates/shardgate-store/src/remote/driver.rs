//! [`Driver`] over a [`RemoteStore`].
//!
//! On first use of an entity the driver provisions its space: the space is
//! created if missing, its format is brought in line with the entity fields
//! and every effective index is created. Afterwards the driver works from a
//! local snapshot of the remote schema, refreshed whenever it changes it.
//!
//! Finds resolve one index from the first clause and send every clause as a
//! probe on that index, batched `page_size` probes per round trip and spread
//! over a small pool of concurrent workers. A clause whose keys differ from
//! the first one probes a shorter key prefix, so every returned tuple is
//! checked against the clauses before it is kept.

use super::constructor::RowConstructor;
use super::format::{cast_index, coerce_clause, desired_format, index_tuple, row_tuple};
use super::store::{RemoteStore, SpaceMeta, Tuple};
use crate::driver::Driver;
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use shardgate_commons::{Clause, EntitySchema, Row, StorageDriver, Value, BUCKET_ID, ID};
use shardgate_configs::RemoteSettings;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::task::JoinSet;

pub struct RemoteDriver {
    dsn: String,
    store: Arc<dyn RemoteStore>,
    settings: RemoteSettings,
    spaces: RwLock<HashMap<String, SpaceMeta>>,
    initialized: tokio::sync::Mutex<HashSet<&'static str>>,
    constructors: DashMap<String, Arc<RowConstructor>>,
}

/// Rows gathered by partitioned find workers, deduplicated by primary key.
#[derive(Default)]
struct Accumulator {
    rows: Vec<Row>,
    seen: HashSet<(Option<i64>, u64)>,
}

impl Accumulator {
    fn push(&mut self, row: Row) {
        let bucket_id = row.get(BUCKET_ID).and_then(Value::as_i64);
        match row.id() {
            Some(id) if !self.seen.insert((bucket_id, id)) => {}
            _ => self.rows.push(row),
        }
    }
}

impl RemoteDriver {
    pub fn new(dsn: impl Into<String>, store: Arc<dyn RemoteStore>, settings: RemoteSettings) -> Self {
        Self {
            dsn: dsn.into(),
            store,
            settings,
            spaces: RwLock::new(HashMap::new()),
            initialized: tokio::sync::Mutex::new(HashSet::new()),
            constructors: DashMap::new(),
        }
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    /// Worker count for a find over `probes` probes.
    pub fn worker_count(&self, probes: usize, limit: Option<usize>) -> usize {
        if limit == Some(1) {
            return 1;
        }
        let page_size = self.settings.page_size.max(1);
        let pages = probes.div_ceil(page_size);
        pages.min(self.settings.max_concurrency.max(1))
    }

    async fn refresh_schema(&self) -> Result<()> {
        let spaces = self.store.fetch_schema().await?;
        let mut snapshot = self.spaces.write();
        snapshot.clear();
        for space in spaces {
            snapshot.insert(space.name.clone(), space);
        }
        Ok(())
    }

    fn space(&self, name: &str) -> Result<SpaceMeta> {
        self.spaces
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::SpaceNotFound(name.to_string()))
    }

    async fn ensure_connected(&self) -> Result<()> {
        if !self.store.is_connected() {
            log::debug!("Connecting to remote store {}", self.dsn);
            self.store.connect().await?;
            self.refresh_schema().await?;
        }
        Ok(())
    }

    async fn sync_format(&self, schema: &EntitySchema) -> Result<()> {
        let format = desired_format(schema);
        if self.space(schema.name)?.format == format {
            return Ok(());
        }

        log::info!("Updating format of space {} on {}", schema.name, self.dsn);
        self.store.set_format(schema.name, &format).await?;
        self.refresh_schema().await
    }

    async fn sync_indexes(&self, schema: &EntitySchema) -> Result<()> {
        let space = self.space(schema.name)?;
        let mut changed = false;

        for index in schema.effective_indexes() {
            let name = index.name();
            if space.index(&name).is_some() {
                continue;
            }
            log::info!("Creating index {} on space {}", name, schema.name);
            self.store
                .create_index(schema.name, &name, &index.fields, index.unique)
                .await?;
            changed = true;
        }

        if changed {
            self.refresh_schema().await?;
        }
        Ok(())
    }

    fn constructor(&self, space: &SpaceMeta) -> Arc<RowConstructor> {
        self.constructors
            .entry(space.name.clone())
            .or_insert_with(|| Arc::new(RowConstructor::from_format(&space.format)))
            .clone()
    }

    /// Next id for `space`, creating `sq_<space>` on first use.
    async fn next_id(&self, space: &SpaceMeta) -> Result<i64> {
        let sequence = format!("sq_{}", space.name);

        if !self.store.sequence_exists(&sequence).await? {
            let primary = space.primary().ok_or_else(|| StoreError::IndexNotFound {
                space: space.name.clone(),
                keys: Vec::new(),
            })?;
            let position = space
                .position(ID)
                .ok_or_else(|| StoreError::Backend(format!("space {} has no id column", space.name)))?;

            let existing = self.store.select(&space.name, &primary.name, &[]).await?;
            let start = existing
                .iter()
                .filter_map(|tuple| tuple.get(position).and_then(Value::as_i64))
                .max()
                .map_or(1, |max| max + 1);

            log::debug!("Creating sequence {} starting at {}", sequence, start);
            self.store.create_sequence(&sequence, start).await?;
        }

        self.store.sequence_next(&sequence).await
    }

    async fn partitioned_find(
        &self,
        space: &SpaceMeta,
        index: &str,
        probes: Vec<Tuple>,
        filters: Vec<Clause>,
        limit: Option<usize>,
    ) -> Vec<Row> {
        let workers = self.worker_count(probes.len(), limit);
        let page_size = self.settings.page_size.max(1);
        let constructor = self.constructor(space);
        let queue = Arc::new(Mutex::new(VecDeque::from(probes)));
        let accumulator = Arc::new(Mutex::new(Accumulator::default()));
        let filters = Arc::new(filters);

        let mut tasks = JoinSet::new();
        for _ in 0..workers {
            let store = Arc::clone(&self.store);
            let space = space.name.clone();
            let index = index.to_string();
            let queue = Arc::clone(&queue);
            let accumulator = Arc::clone(&accumulator);
            let constructor = Arc::clone(&constructor);
            let filters = Arc::clone(&filters);

            tasks.spawn(async move {
                loop {
                    let page: Vec<Tuple> = {
                        let mut queue = queue.lock();
                        let take = page_size.min(queue.len());
                        queue.drain(..take).collect()
                    };
                    if page.is_empty() {
                        break;
                    }

                    let matches = store.select_batch(&space, &index, &page).await?;

                    let mut gathered = accumulator.lock();
                    for tuple in matches.into_iter().flatten() {
                        let row = constructor.build(tuple);
                        if Row::matches_any(&filters, &row) {
                            gathered.push(row);
                        }
                    }
                    if limit.is_some_and(|limit| gathered.rows.len() > limit) {
                        break;
                    }
                }
                Ok::<(), StoreError>(())
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::warn!("Find worker on {} failed: {}", space.name, e),
                Err(e) => log::warn!("Find worker on {} aborted: {}", space.name, e),
            }
        }

        let mut rows = std::mem::take(&mut accumulator.lock().rows);
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        rows
    }
}

#[async_trait]
impl Driver for RemoteDriver {
    fn kind(&self) -> StorageDriver {
        StorageDriver::Remote
    }

    async fn find(
        &self,
        schema: &EntitySchema,
        queries: &[Clause],
        limit: Option<usize>,
    ) -> Result<Vec<Row>> {
        self.init_schema(schema).await?;

        let first = match queries.first() {
            Some(first) => first,
            None => return Ok(Vec::new()),
        };

        let space = self.space(schema.name)?;
        let keys: Vec<&str> = first.keys().collect();
        let index = cast_index(&space, &keys)?;
        let probes = queries
            .iter()
            .map(|clause| index_tuple(index, clause))
            .collect::<Result<Vec<_>>>()?;
        let filters = queries
            .iter()
            .map(|clause| coerce_clause(&space.format, clause))
            .collect::<Result<Vec<_>>>()?;

        let index = index.name.clone();
        Ok(self.partitioned_find(&space, &index, probes, filters, limit).await)
    }

    async fn insert(&self, schema: &EntitySchema, data: Row) -> Result<Row> {
        self.init_schema(schema).await?;

        let space = self.space(schema.name)?;
        let mut tuple = row_tuple(&space.format, &data)?;
        if let Some(position) = space.position(ID) {
            if tuple[position] == Value::Int(0) {
                tuple[position] = Value::Int(self.next_id(&space).await?);
            }
        }

        let stored = self.store.insert(schema.name, tuple).await?;
        let row = self.constructor(&space).build(stored);
        log::debug!("[{}] inserted {} {}", self.dsn, schema.name, row);
        Ok(row)
    }

    async fn init_schema(&self, schema: &EntitySchema) -> Result<()> {
        self.ensure_connected().await?;

        let mut initialized = self.initialized.lock().await;
        if initialized.contains(schema.name) {
            return Ok(());
        }

        // The snapshot may predate spaces created by other clients
        if self.space(schema.name).is_err() {
            self.refresh_schema().await?;
        }
        if self.space(schema.name).is_err() {
            log::info!("Creating space {} on {}", schema.name, self.dsn);
            self.store.create_space(schema.name).await?;
            self.refresh_schema().await?;
        }

        self.sync_format(schema).await?;
        self.sync_indexes(schema).await?;

        initialized.insert(schema.name);
        Ok(())
    }

    async fn update(&self, schema: &EntitySchema, query: &Clause, changes: &Row) -> Result<Vec<Row>> {
        let rows = self.find(schema, std::slice::from_ref(query), None).await?;
        let space = self.space(schema.name)?;
        let constructor = self.constructor(&space);

        let mut updated = Vec::with_capacity(rows.len());
        for mut row in rows {
            row.merge(changes);
            let stored = self
                .store
                .replace(schema.name, row_tuple(&space.format, &row)?)
                .await?;
            updated.push(constructor.build(stored));
        }
        Ok(updated)
    }
}
