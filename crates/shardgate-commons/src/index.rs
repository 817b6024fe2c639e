use crate::entity::Entity;
use crate::row::{BUCKET_ID, ID};

/// Secondary index declaration over one entity's fields.
///
/// Repositories declare indexes in terms of domain fields only. Storage
/// backends see the widened form, which always starts with `bucket_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Index {
    pub entity: &'static str,
    pub fields: Vec<String>,
    pub unique: bool,
}

impl Index {
    pub fn new<E: Entity>(fields: &[&str]) -> Self {
        Self::build(E::NAME, fields, false)
    }

    pub fn unique<E: Entity>(fields: &[&str]) -> Self {
        Self::build(E::NAME, fields, true)
    }

    fn build(entity: &'static str, fields: &[&str], unique: bool) -> Self {
        Self {
            entity,
            fields: fields.iter().map(|f| f.to_string()).collect(),
            unique,
        }
    }

    /// The implicit unique `(bucket_id, id)` index every entity carries.
    pub fn primary(entity: &'static str) -> Self {
        Self::build(entity, &[BUCKET_ID, ID], true)
    }

    /// Copy with `bucket_id` prepended unless already leading.
    pub fn widened(&self) -> Index {
        if self.fields.first().map(String::as_str) == Some(BUCKET_ID) {
            return self.clone();
        }
        let mut fields = Vec::with_capacity(self.fields.len() + 1);
        fields.push(BUCKET_ID.to_string());
        fields.extend(self.fields.iter().cloned());
        Index {
            entity: self.entity,
            fields,
            unique: self.unique,
        }
    }

    /// Storage-level name: field names joined with `_`.
    pub fn name(&self) -> String {
        self.fields.join("_")
    }
}
