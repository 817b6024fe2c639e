//! In-process reference driver.
//!
//! One ordered row list per entity behind a `parking_lot::RwLock`. Lookups
//! are full scans; ids are positional (`len + 1`), so rows are never removed.

use crate::driver::Driver;
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use shardgate_commons::{Clause, EntitySchema, Row, StorageDriver, ID};
use std::collections::HashMap;

pub struct MemoryDriver {
    dsn: String,
    data: RwLock<HashMap<&'static str, Vec<Row>>>,
}

impl MemoryDriver {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            data: RwLock::new(HashMap::new()),
        }
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    /// Number of rows stored for `entity`.
    pub fn len(&self, entity: &str) -> usize {
        self.data.read().get(entity).map_or(0, Vec::len)
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn kind(&self) -> StorageDriver {
        StorageDriver::Memory
    }

    async fn find(
        &self,
        schema: &EntitySchema,
        queries: &[Clause],
        limit: Option<usize>,
    ) -> Result<Vec<Row>> {
        let data = self.data.read();
        let rows = match data.get(schema.name) {
            Some(rows) => rows,
            None => return Ok(Vec::new()),
        };

        let matching = rows.iter().filter(|row| Row::matches_any(queries, row)).cloned();
        Ok(match limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn insert(&self, schema: &EntitySchema, mut data: Row) -> Result<Row> {
        let mut store = self.data.write();
        let rows = store.entry(schema.name).or_default();
        data.insert(ID, (rows.len() + 1) as u64);
        rows.push(data.clone());

        log::debug!("[{}] inserted {} {}", self.dsn, schema.name, data);
        Ok(data)
    }

    async fn init_schema(&self, schema: &EntitySchema) -> Result<()> {
        self.data.write().entry(schema.name).or_default();
        Ok(())
    }

    async fn update(&self, schema: &EntitySchema, query: &Clause, changes: &Row) -> Result<Vec<Row>> {
        let mut store = self.data.write();
        let mut updated = Vec::new();
        if let Some(rows) = store.get_mut(schema.name) {
            for row in rows.iter_mut().filter(|row| query.matches(row)) {
                row.merge(changes);
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardgate_commons::{entity, row, Value};

    entity! {
        struct Note {
            title: String,
            rank: i64 = 0,
        }
    }

    fn schema() -> EntitySchema {
        EntitySchema::of::<Note>()
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let driver = MemoryDriver::new("");
        let first = driver.insert(&schema(), row! { "id" => 40, "title" => "a" }).await.unwrap();
        let second = driver.insert(&schema(), row! { "title" => "b" }).await.unwrap();

        assert_eq!(first.id(), Some(1));
        assert_eq!(second.id(), Some(2));
        assert_eq!(driver.len("Note"), 2);
    }

    #[tokio::test]
    async fn test_disjunction_and_limit() {
        let driver = MemoryDriver::new("");
        for title in ["a", "b", "c"] {
            driver.insert(&schema(), row! { "title" => title }).await.unwrap();
        }

        let rows = driver
            .find(&schema(), &[row! { "title" => "a" }, row! { "title" => "c" }], None)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);

        assert!(driver.find(&schema(), &[], None).await.unwrap().is_empty());
        assert_eq!(driver.find(&schema(), &[Row::new()], None).await.unwrap().len(), 3);
        assert_eq!(driver.find(&schema(), &[Row::new()], Some(2)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_find_before_init_is_empty() {
        let driver = MemoryDriver::new("");
        assert!(driver.find(&schema(), &[Row::new()], None).await.unwrap().is_empty());
        assert!(driver.find_one(&schema(), &[Row::new()]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_or_create_is_idempotent() {
        let driver = MemoryDriver::new("");
        let query = row! { "title" => "x" };
        let first = driver.find_or_create(&schema(), &query, query.clone()).await.unwrap();
        let second = driver.find_or_create(&schema(), &query, query.clone()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(driver.len("Note"), 1);
    }

    #[tokio::test]
    async fn test_find_or_fail_names_entity() {
        let driver = MemoryDriver::new("");
        let err = driver.find_or_fail(&schema(), &[row! { "id" => 1 }]).await.unwrap_err();
        assert_eq!(err.to_string(), "Note not found");
    }

    #[tokio::test]
    async fn test_update_in_place() {
        let driver = MemoryDriver::new("");
        driver.insert(&schema(), row! { "title" => "a" }).await.unwrap();
        let updated = driver
            .update(&schema(), &row! { "id" => 1 }, &row! { "rank" => 5 })
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);

        let row = driver.find_or_fail(&schema(), &[row! { "id" => 1 }]).await.unwrap();
        assert_eq!(row.get("rank"), Some(&Value::Int(5)));
    }
}
