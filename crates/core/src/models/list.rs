use std::{collections::HashSet, ops::Deref, sync::Arc};

use tracing::warn;

use super::Entity;

/// Shared, immutable list of shared entities.
///
/// Cloning is cheap. Two lists are the "same" list only when
/// [`EntityList::ptr_eq`] holds; consumers memoise on that.
#[derive(Debug, Clone, Default)]
pub struct EntityList(Arc<Vec<Arc<Entity>>>);

impl EntityList {
    /// Build a list, dropping later duplicates of an id.
    pub fn new(entities: Vec<Arc<Entity>>) -> Self {
        let mut seen = HashSet::with_capacity(entities.len());
        let mut unique = Vec::with_capacity(entities.len());
        for entity in entities {
            if seen.insert(entity.id.clone()) {
                unique.push(entity);
            } else {
                warn!("dropping duplicate entity id {}", entity.id);
            }
        }
        Self(Arc::new(unique))
    }

    /// Wrap owned entities.
    pub fn from_entities(entities: Vec<Entity>) -> Self {
        Self::new(entities.into_iter().map(Arc::new).collect())
    }

    /// Whether both handles point at the same underlying list.
    pub fn ptr_eq(&self, other: &EntityList) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Find an entity by id.
    pub fn get(&self, id: &str) -> Option<&Arc<Entity>> {
        self.0.iter().find(|entity| entity.id == id)
    }

    /// Copy of the list with the entity sharing `entity.id` swapped out.
    ///
    /// Returns `None` when no entity has that id.
    pub fn with_replaced(&self, entity: Arc<Entity>) -> Option<EntityList> {
        let index = self.0.iter().position(|current| current.id == entity.id)?;
        let mut entities = self.0.as_ref().clone();
        entities[index] = entity;
        Some(Self(Arc::new(entities)))
    }

    /// Borrow the entities for serialisation.
    pub fn as_refs(&self) -> Vec<&Entity> {
        self.0.iter().map(|entity| entity.as_ref()).collect()
    }
}

impl Deref for EntityList {
    type Target = [Arc<Entity>];

    fn deref(&self) -> &Self::Target {
        self.0.as_slice()
    }
}

impl From<Vec<Entity>> for EntityList {
    fn from(entities: Vec<Entity>) -> Self {
        Self::from_entities(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::entity;

    #[test]
    fn duplicate_ids_keep_first() {
        let mut second = entity("1");
        second.level = 99;
        let list = EntityList::from_entities(vec![entity("1"), second, entity("2")]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.get("1").map(|girl| girl.level), Some(1));
    }

    #[test]
    fn replace_keeps_other_references() {
        let list = EntityList::from_entities(vec![entity("1"), entity("2")]);
        let mut updated = entity("2");
        updated.level = 5;

        let next = list
            .with_replaced(Arc::new(updated))
            .expect("entity 2 exists");
        assert!(!next.ptr_eq(&list));
        assert!(Arc::ptr_eq(&next[0], &list[0]));
        assert_eq!(next[1].level, 5);
        assert!(list.with_replaced(Arc::new(entity("3"))).is_none());
    }
}
