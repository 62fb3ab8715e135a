use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::{BlessingContext, BlessingSet, Entity, EntityList};

/// Authoritative in-memory state: the entity list and blessing data.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    entities: EntityList,
    blessings: BlessingSet,
}

impl EntityStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current list.
    pub fn entities(&self) -> EntityList {
        self.entities.clone()
    }

    /// Current blessings.
    pub fn blessings(&self) -> &BlessingSet {
        &self.blessings
    }

    /// Blessing context evaluated at `at`.
    pub fn context(&self, at: DateTime<Utc>) -> BlessingContext {
        BlessingContext::new(self.blessings.clone(), at)
    }

    /// Entity by id.
    pub fn get(&self, id: &str) -> Option<Arc<Entity>> {
        self.entities.get(id).cloned()
    }

    /// Install a new list. Returns `false` when it is the list already held.
    pub fn set_entities(&mut self, entities: EntityList) -> bool {
        if entities.ptr_eq(&self.entities) {
            return false;
        }
        self.entities = entities;
        true
    }

    /// Splice `entity` in by id. Returns the new list, or `None` for an unknown id.
    pub fn replace(&mut self, entity: Arc<Entity>) -> Option<EntityList> {
        let updated = self.entities.with_replaced(entity)?;
        self.entities = updated.clone();
        Some(updated)
    }

    /// Install new blessing data.
    pub fn set_blessings(&mut self, blessings: BlessingSet) {
        self.blessings = blessings;
    }
}
