//! Test utilities for shardgate-store.
//!
//! [`InMemoryRemoteStore`] implements the [`RemoteStore`] capability inside the
//! process so the remote driver can be exercised without a server. It checks
//! tuples against the space format, enforces unique indexes, keeps sequences
//! and records round-trip statistics. Latency and batch failures can be
//! injected.

use crate::error::{Result, StoreError};
use crate::remote::{FieldFormat, IndexMeta, RemoteConnector, RemoteStore, RemoteType, SpaceMeta, Tuple};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use shardgate_commons::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

struct SpaceData {
    meta: SpaceMeta,
    tuples: Vec<Tuple>,
}

impl SpaceData {
    fn key(&self, index: &IndexMeta, tuple: &Tuple) -> Tuple {
        index
            .parts
            .iter()
            .map(|part| {
                self.meta
                    .position(&part.name)
                    .and_then(|pos| tuple.get(pos).cloned())
                    .unwrap_or_default()
            })
            .collect()
    }

    fn check_format(&self, tuple: &Tuple) -> Result<()> {
        if tuple.len() != self.meta.format.len() {
            return Err(StoreError::Backend(format!(
                "Tuple field count {} does not match space {} format ({})",
                tuple.len(),
                self.meta.name,
                self.meta.format.len()
            )));
        }
        for (field, value) in self.meta.format.iter().zip(tuple) {
            let ok = match (field.ty, value) {
                (RemoteType::Unsigned, Value::Int(v)) => *v >= 0,
                (RemoteType::Number, Value::Int(_) | Value::Float(_)) => true,
                (RemoteType::String, Value::Str(_)) => true,
                _ => false,
            };
            if !ok {
                return Err(StoreError::Backend(format!(
                    "Tuple field '{}' type does not match one required by operation: expected {}, got {}",
                    field.name,
                    field.ty,
                    value.kind()
                )));
            }
        }
        Ok(())
    }

    /// Unique index violated by `tuple`, ignoring the row at `skip`.
    fn check_unique(&self, tuple: &Tuple, skip: Option<usize>) -> Result<()> {
        for index in self.meta.indexes.iter().filter(|index| index.unique) {
            let key = self.key(index, tuple);
            let duplicate = self
                .tuples
                .iter()
                .enumerate()
                .any(|(pos, existing)| Some(pos) != skip && self.key(index, existing) == key);
            if duplicate {
                return Err(StoreError::UniqueConstraintViolation(format!(
                    "Duplicate key exists in unique index \"{}\" in space \"{}\"",
                    index.name, self.meta.name
                )));
            }
        }
        Ok(())
    }

    fn select(&self, index: &IndexMeta, key: &[Value]) -> Vec<Tuple> {
        let mut matches: Vec<(Tuple, &Tuple)> = self
            .tuples
            .iter()
            .map(|tuple| (self.key(index, tuple), tuple))
            .filter(|(tuple_key, _)| tuple_key.len() >= key.len() && tuple_key[..key.len()] == *key)
            .collect();
        matches.sort_by(|(a, _), (b, _)| compare_keys(a, b));
        matches.into_iter().map(|(_, tuple)| tuple.clone()).collect()
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

fn compare_keys(a: &[Value], b: &[Value]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(a, b)| compare_values(a, b))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

fn zero_value(ty: RemoteType) -> Value {
    match ty {
        RemoteType::Unsigned => Value::Int(0),
        RemoteType::Number => Value::Float(0.0),
        RemoteType::String => Value::Str(String::new()),
    }
}

/// In-process [`RemoteStore`].
#[derive(Default)]
pub struct InMemoryRemoteStore {
    connected: AtomicBool,
    spaces: RwLock<BTreeMap<String, SpaceData>>,
    sequences: Mutex<HashMap<String, i64>>,
    latency: Mutex<Option<Duration>>,
    failing_batches: AtomicUsize,
    batch_calls: AtomicUsize,
    format_updates: AtomicUsize,
    index_creations: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every batched select by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// Make the next `count` batched selects fail.
    pub fn fail_next_batches(&self, count: usize) {
        self.failing_batches.store(count, AtomicOrdering::SeqCst);
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn format_updates(&self) -> usize {
        self.format_updates.load(AtomicOrdering::SeqCst)
    }

    pub fn index_creations(&self) -> usize {
        self.index_creations.load(AtomicOrdering::SeqCst)
    }

    /// Highest number of batched selects observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(AtomicOrdering::SeqCst)
    }

    pub fn reset_stats(&self) {
        self.batch_calls.store(0, AtomicOrdering::SeqCst);
        self.max_in_flight.store(0, AtomicOrdering::SeqCst);
    }

    /// Stored tuples of `space`, in insertion order.
    pub fn tuples(&self, space: &str) -> Vec<Tuple> {
        self.spaces
            .read()
            .get(space)
            .map(|data| data.tuples.clone())
            .unwrap_or_default()
    }

    pub fn disconnect(&self) {
        self.connected.store(false, AtomicOrdering::SeqCst);
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(AtomicOrdering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Backend("Not connected".to_string()))
        }
    }

    fn with_space<T>(&self, space: &str, f: impl FnOnce(&SpaceData) -> Result<T>) -> Result<T> {
        self.ensure_connected()?;
        let spaces = self.spaces.read();
        let data = spaces
            .get(space)
            .ok_or_else(|| StoreError::SpaceNotFound(space.to_string()))?;
        f(data)
    }

    fn with_space_mut<T>(&self, space: &str, f: impl FnOnce(&mut SpaceData) -> Result<T>) -> Result<T> {
        self.ensure_connected()?;
        let mut spaces = self.spaces.write();
        let data = spaces
            .get_mut(space)
            .ok_or_else(|| StoreError::SpaceNotFound(space.to_string()))?;
        f(data)
    }

    fn select_now(&self, space: &str, index: &str, keys: &[Tuple]) -> Result<Vec<Vec<Tuple>>> {
        self.with_space(space, |data| {
            let index = data
                .meta
                .index(index)
                .ok_or_else(|| StoreError::Backend(format!("No index {} in space {}", index, space)))?;
            Ok(keys
                .iter()
                .map(|key| data.select(index, key))
                .filter(|rows| !rows.is_empty())
                .collect())
        })
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, AtomicOrdering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(AtomicOrdering::SeqCst)
    }

    async fn fetch_schema(&self) -> Result<Vec<SpaceMeta>> {
        self.ensure_connected()?;
        Ok(self.spaces.read().values().map(|data| data.meta.clone()).collect())
    }

    async fn create_space(&self, space: &str) -> Result<()> {
        self.ensure_connected()?;
        self.spaces
            .write()
            .entry(space.to_string())
            .or_insert_with(|| SpaceData {
                meta: SpaceMeta::new(space),
                tuples: Vec::new(),
            });
        Ok(())
    }

    async fn set_format(&self, space: &str, format: &[FieldFormat]) -> Result<()> {
        self.with_space_mut(space, |data| {
            let old = std::mem::replace(&mut data.meta.format, format.to_vec());
            for tuple in data.tuples.iter_mut() {
                *tuple = format
                    .iter()
                    .map(|field| {
                        old.iter()
                            .position(|f| f.name == field.name)
                            .and_then(|pos| tuple.get(pos).cloned())
                            .unwrap_or_else(|| zero_value(field.ty))
                    })
                    .collect();
            }
            for index in data.meta.indexes.iter_mut() {
                for part in index.parts.iter_mut() {
                    if let Some(field) = format.iter().find(|f| f.name == part.name) {
                        part.ty = field.ty;
                    }
                }
            }
            Ok(())
        })?;
        self.format_updates.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(())
    }

    async fn create_index(&self, space: &str, name: &str, parts: &[String], unique: bool) -> Result<()> {
        self.with_space_mut(space, |data| {
            if data.meta.index(name).is_some() {
                return Ok(());
            }
            let parts = parts
                .iter()
                .map(|part| {
                    data.meta
                        .format
                        .iter()
                        .find(|f| &f.name == part)
                        .cloned()
                        .ok_or_else(|| StoreError::Backend(format!("Field '{}' was not found in space {} format", part, space)))
                })
                .collect::<Result<Vec<_>>>()?;
            data.meta.indexes.push(IndexMeta {
                name: name.to_string(),
                parts,
                unique,
            });
            Ok(())
        })?;
        self.index_creations.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(())
    }

    async fn insert(&self, space: &str, tuple: Tuple) -> Result<Tuple> {
        self.with_space_mut(space, |data| {
            data.check_format(&tuple)?;
            data.check_unique(&tuple, None)?;
            data.tuples.push(tuple.clone());
            Ok(tuple)
        })
    }

    async fn replace(&self, space: &str, tuple: Tuple) -> Result<Tuple> {
        self.with_space_mut(space, |data| {
            data.check_format(&tuple)?;
            let existing = match data.meta.primary() {
                Some(primary) => {
                    let key = data.key(primary, &tuple);
                    data.tuples.iter().position(|t| data.key(primary, t) == key)
                }
                None => None,
            };
            data.check_unique(&tuple, existing)?;
            match existing {
                Some(pos) => data.tuples[pos] = tuple.clone(),
                None => data.tuples.push(tuple.clone()),
            }
            Ok(tuple)
        })
    }

    async fn select(&self, space: &str, index: &str, key: &[Value]) -> Result<Vec<Tuple>> {
        let mut rows = self.select_now(space, index, &[key.to_vec()])?;
        Ok(rows.pop().unwrap_or_default())
    }

    async fn select_batch(&self, space: &str, index: &str, keys: &[Tuple]) -> Result<Vec<Vec<Tuple>>> {
        self.ensure_connected()?;
        self.batch_calls.fetch_add(1, AtomicOrdering::SeqCst);

        let failing = self
            .failing_batches
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(StoreError::Backend("Injected batch failure".to_string()));
        }

        let current = self.in_flight.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, AtomicOrdering::SeqCst);

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let result = self.select_now(space, index, keys);
        self.in_flight.fetch_sub(1, AtomicOrdering::SeqCst);
        result
    }

    async fn sequence_exists(&self, name: &str) -> Result<bool> {
        self.ensure_connected()?;
        Ok(self.sequences.lock().contains_key(name))
    }

    async fn create_sequence(&self, name: &str, start: i64) -> Result<()> {
        self.ensure_connected()?;
        self.sequences.lock().entry(name.to_string()).or_insert(start);
        Ok(())
    }

    async fn sequence_next(&self, name: &str) -> Result<i64> {
        self.ensure_connected()?;
        let mut sequences = self.sequences.lock();
        let next = sequences
            .get_mut(name)
            .ok_or_else(|| StoreError::Backend(format!("Sequence '{}' does not exist", name)))?;
        let value = *next;
        *next += 1;
        Ok(value)
    }
}

/// Hands out one [`InMemoryRemoteStore`] per dsn.
#[derive(Default)]
pub struct MemoryRemoteConnector {
    stores: DashMap<String, Arc<InMemoryRemoteStore>>,
}

impl MemoryRemoteConnector {
    /// The store behind `dsn`, created on first request.
    pub fn store(&self, dsn: &str) -> Arc<InMemoryRemoteStore> {
        self.stores
            .entry(dsn.to_string())
            .or_insert_with(|| Arc::new(InMemoryRemoteStore::new()))
            .clone()
    }
}

impl RemoteConnector for MemoryRemoteConnector {
    fn connect(&self, dsn: &str) -> Result<Arc<dyn RemoteStore>> {
        let store: Arc<dyn RemoteStore> = self.store(dsn);
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> Vec<FieldFormat> {
        vec![
            FieldFormat::new("bucket_id", RemoteType::Unsigned),
            FieldFormat::new("id", RemoteType::Unsigned),
            FieldFormat::new("name", RemoteType::String),
        ]
    }

    async fn store() -> InMemoryRemoteStore {
        let store = InMemoryRemoteStore::new();
        store.connect().await.unwrap();
        store.create_space("Item").await.unwrap();
        store.set_format("Item", &format()).await.unwrap();
        store
            .create_index("Item", "bucket_id_id", &["bucket_id".into(), "id".into()], true)
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let store = InMemoryRemoteStore::new();
        assert!(store.fetch_schema().await.is_err());
        store.connect().await.unwrap();
        assert!(store.fetch_schema().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_type_checked_insert() {
        let store = store().await;
        let bad = vec![Value::Int(1), Value::from("x"), Value::from("n")];
        assert!(store.insert("Item", bad).await.is_err());
    }

    #[tokio::test]
    async fn test_unique_index_and_replace() {
        let store = store().await;
        let tuple = vec![Value::Int(1), Value::Int(1), Value::from("a")];
        store.insert("Item", tuple.clone()).await.unwrap();

        let err = store.insert("Item", tuple).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueConstraintViolation(_)));

        store
            .replace("Item", vec![Value::Int(1), Value::Int(1), Value::from("b")])
            .await
            .unwrap();
        assert_eq!(store.tuples("Item")[0][2], Value::from("b"));
    }

    #[tokio::test]
    async fn test_prefix_select_sorted() {
        let store = store().await;
        for (bucket, id) in [(2, 5), (1, 3), (1, 1)] {
            store
                .insert("Item", vec![Value::Int(bucket), Value::Int(id), Value::from("")])
                .await
                .unwrap();
        }

        let rows = store.select("Item", "bucket_id_id", &[Value::Int(1)]).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|t| t[1].clone()).collect();
        assert_eq!(ids, vec![Value::Int(1), Value::Int(3)]);
        assert_eq!(store.select("Item", "bucket_id_id", &[]).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_format_change_pads_tuples() {
        let store = store().await;
        store
            .insert("Item", vec![Value::Int(1), Value::Int(1), Value::from("a")])
            .await
            .unwrap();

        let mut wider = format();
        wider.push(FieldFormat::new("weight", RemoteType::Number));
        store.set_format("Item", &wider).await.unwrap();

        assert_eq!(store.tuples("Item")[0][3], Value::Float(0.0));
        assert_eq!(store.format_updates(), 2);
    }

    #[tokio::test]
    async fn test_sequences() {
        let store = store().await;
        store.create_sequence("sq_Item", 7).await.unwrap();
        store.create_sequence("sq_Item", 1).await.unwrap();
        assert_eq!(store.sequence_next("sq_Item").await.unwrap(), 7);
        assert_eq!(store.sequence_next("sq_Item").await.unwrap(), 8);
        assert!(store.sequence_next("sq_missing").await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = store().await;
        store.fail_next_batches(1);
        assert!(store.select_batch("Item", "bucket_id_id", &[vec![]]).await.is_err());
        assert!(store.select_batch("Item", "bucket_id_id", &[vec![]]).await.is_ok());
        assert_eq!(store.batch_calls(), 2);
    }
}
