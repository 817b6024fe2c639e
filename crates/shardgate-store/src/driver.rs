//! Driver abstraction over a physical storage.
//!
//! Every operation receives the entity's [`EntitySchema`] instead of a
//! concrete type, so one driver instance serves all entities stored on its
//! backend. Queries are disjunctions of equality clauses: a row matches when it
//! satisfies every pair of at least one clause. An empty clause list matches
//! nothing; a list holding one empty clause matches everything.

use crate::error::{Result, StoreError};
use async_trait::async_trait;
use shardgate_commons::{Clause, EntitySchema, Row, StorageDriver};

#[async_trait]
pub trait Driver: Send + Sync {
    fn kind(&self) -> StorageDriver;

    /// Rows matching any of `queries`, capped at `limit` when set.
    async fn find(
        &self,
        schema: &EntitySchema,
        queries: &[Clause],
        limit: Option<usize>,
    ) -> Result<Vec<Row>>;

    async fn find_one(&self, schema: &EntitySchema, queries: &[Clause]) -> Result<Option<Row>> {
        let rows = self.find(schema, queries, Some(1)).await?;
        Ok(rows.into_iter().next())
    }

    /// First row matching `query`, or the freshly inserted `data`.
    ///
    /// Not atomic: concurrent callers may both insert unless a unique index
    /// rejects the second row.
    async fn find_or_create(&self, schema: &EntitySchema, query: &Clause, data: Row) -> Result<Row> {
        let rows = self.find(schema, std::slice::from_ref(query), None).await?;
        if let Some(row) = rows.into_iter().next() {
            return Ok(row);
        }
        self.insert(schema, data).await
    }

    async fn find_or_fail(&self, schema: &EntitySchema, queries: &[Clause]) -> Result<Row> {
        self.find_one(schema, queries)
            .await?
            .ok_or_else(|| StoreError::NotFound(schema.name.to_string()))
    }

    /// Persist `data` under a driver-assigned id and return the stored row.
    async fn insert(&self, schema: &EntitySchema, data: Row) -> Result<Row>;

    /// Provision storage for the entity. Idempotent.
    async fn init_schema(&self, schema: &EntitySchema) -> Result<()>;

    /// Merge `changes` into every row matching `query`; returns the stored rows.
    async fn update(&self, schema: &EntitySchema, query: &Clause, changes: &Row) -> Result<Vec<Row>>;
}
