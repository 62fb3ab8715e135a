use std::{collections::HashMap, sync::Arc};

use crate::models::{Entity, EntityList};

/// Merge freshly fetched entities into the current list.
///
/// Every fresh entity that is quick-equal to the current entity with the
/// same id is replaced by the current `Arc`. When that happens for every
/// entity and no entity was added or removed, `old` itself is returned.
pub fn reconcile(old: &EntityList, fresh: Vec<Entity>) -> EntityList {
    let previous: HashMap<&str, &Arc<Entity>> = old
        .iter()
        .map(|entity| (entity.id.as_str(), entity))
        .collect();

    let mut kept = 0usize;
    let merged: Vec<Arc<Entity>> = fresh
        .into_iter()
        .map(|entity| match previous.get(entity.id.as_str()) {
            Some(current) if current.quick_eq(&entity) => {
                kept += 1;
                Arc::clone(current)
            }
            _ => Arc::new(entity),
        })
        .collect();

    let merged = EntityList::new(merged);
    if merged.len() == old.len() && kept == merged.len() {
        old.clone()
    } else {
        merged
    }
}
