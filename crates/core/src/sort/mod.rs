//! Deterministic entity ordering.
//!
//! A [`Sorter`] is a chain of ascending comparators ending with an id
//! tie-break, so every list has exactly one sorted order. Direction is
//! applied by reversing the ascending result, and owned entities are then
//! moved ahead of unowned ones without disturbing their relative order.

mod builtin;

use std::{cmp::Ordering, fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::models::Entity;

pub use builtin::{resolve, BUILTIN_SORTS, DEFAULT_SORT};

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first.
    Asc,
    /// Largest first.
    #[default]
    Desc,
}

impl SortDirection {
    /// The opposite direction.
    pub fn toggle(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Persisted sort choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    /// Identifier of a built-in sorter.
    #[serde(rename = "sortId")]
    pub sort_id: String,
    /// Requested direction.
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortConfig {
    /// Config for `sort_id` in `direction`.
    pub fn new(sort_id: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            sort_id: sort_id.into(),
            direction,
        }
    }
}

impl Default for SortConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SORT, SortDirection::Desc)
    }
}

/// Ascending comparison of two entities.
pub type Comparator = Arc<dyn Fn(&Entity, &Entity) -> Ordering + Send + Sync>;

/// Wrap a closure as a [`Comparator`].
pub fn comparator<F>(compare: F) -> Comparator
where
    F: Fn(&Entity, &Entity) -> Ordering + Send + Sync + 'static,
{
    Arc::new(compare)
}

/// Immutable ordering built from a comparator chain.
#[derive(Clone)]
pub struct Sorter {
    id: String,
    label: String,
    comparators: Vec<Comparator>,
    direction: SortDirection,
}

impl Sorter {
    /// Build a sorter. The id tie-break is appended to `comparators`.
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        mut comparators: Vec<Comparator>,
        direction: SortDirection,
    ) -> Self {
        comparators.push(comparator(|a, b| a.id.cmp(&b.id)));
        Self {
            id: id.into(),
            label: label.into(),
            comparators,
            direction,
        }
    }

    /// Sorter identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current direction.
    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    /// Same chain in another direction.
    pub fn with_direction(mut self, direction: SortDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Ascending comparison through the chain, ignoring direction and ownership.
    pub fn compare_ascending(&self, a: &Entity, b: &Entity) -> Ordering {
        self.comparators
            .iter()
            .map(|compare| compare(a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Full comparison as applied by [`Sorter::sort`].
    pub fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        let chain = match self.direction {
            SortDirection::Asc => self.compare_ascending(a, b),
            SortDirection::Desc => self.compare_ascending(b, a),
        };
        b.own.cmp(&a.own).then(chain)
    }

    /// Sorted copy of `entities`.
    pub fn sort(&self, entities: &[Arc<Entity>]) -> Vec<Arc<Entity>> {
        let mut sorted = entities.to_vec();
        sorted.sort_by(|a, b| self.compare_ascending(a, b));
        if self.direction == SortDirection::Desc {
            sorted.reverse();
        }
        sorted.sort_by_key(|entity| !entity.own);
        sorted
    }

    /// Config that resolves back to this sorter.
    pub fn config(&self) -> SortConfig {
        SortConfig::new(self.id.clone(), self.direction)
    }
}

impl fmt::Debug for Sorter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sorter")
            .field("id", &self.id)
            .field("direction", &self.direction)
            .field("comparators", &self.comparators.len())
            .finish()
    }
}
