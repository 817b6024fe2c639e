//! Per-repository identity map.
//!
//! Guarantees one live instance per (entity, id). Hydrating a row whose id is
//! already mapped updates that instance in place, so every holder of a handle
//! observes the new field values.

use crate::error::{RegistryError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use shardgate_commons::{Entity, Row, ValueError, ID};
use std::any::Any;
use std::sync::Arc;

/// Shared handle to a mapped entity instance.
pub type Shared<E> = Arc<RwLock<E>>;

#[derive(Default)]
pub struct IdentityMap {
    instances: DashMap<(&'static str, u64), Arc<dyn Any + Send + Sync>>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hydrate `row` into the mapped instance for its id, creating it if needed.
    pub fn make<E: Entity>(&self, row: &Row) -> Result<Shared<E>> {
        let id = row.id().ok_or_else(|| ValueError::MissingField(ID.to_string()))?;

        match self.instances.entry((E::NAME, id)) {
            Entry::Occupied(entry) => {
                let instance = downcast::<E>(Arc::clone(entry.get()))?;
                instance.write().apply(row)?;
                Ok(instance)
            }
            Entry::Vacant(entry) => {
                let instance: Shared<E> = Arc::new(RwLock::new(E::from_row(row)?));
                entry.insert(instance.clone());
                Ok(instance)
            }
        }
    }

    /// Live instance for `id`, if one has been hydrated.
    pub fn get<E: Entity>(&self, id: u64) -> Option<Shared<E>> {
        let entry = self.instances.get(&(E::NAME, id))?;
        downcast::<E>(Arc::clone(entry.value())).ok()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

fn downcast<E: Entity>(instance: Arc<dyn Any + Send + Sync>) -> Result<Shared<E>> {
    instance.downcast::<RwLock<E>>().map_err(|_| {
        RegistryError::Configuration(format!("Entity name {} is mapped to another type", E::NAME))
    })
}
