//! Read path over the synchronised list.
//!
//! A [`Query`] sorts first, then applies the persisted filter, then the
//! quick filters, then the free-text search. Sorting comes first so the
//! owned-before-unowned order holds before anything narrows the set.

use std::{cmp::Ordering, sync::Arc};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    filter::{Filter, RootFilter},
    models::{BlessingCondition, BlessingContext, Entity, EntityList},
    sort::{resolve, SortConfig, Sorter},
};

static APOSTROPHES: Lazy<Regex> =
    Lazy::new(|| Regex::new("[‘’ʼ`´]").expect("invalid apostrophe regex"));

/// Lowercase `text` and map typographic apostrophes to `'`.
pub fn fold_text(text: &str) -> String {
    APOSTROPHES.replace_all(&text.to_lowercase(), "'").into_owned()
}

fn fold_chars(text: &str) -> impl Iterator<Item = char> + '_ {
    text.chars().flat_map(char::to_lowercase).map(|c| match c {
        '‘' | '’' | 'ʼ' | '`' | '´' => '\'',
        c => c,
    })
}

/// Compare two strings as [`fold_text`] would, without allocating.
pub fn fold_cmp(a: &str, b: &str) -> Ordering {
    fold_chars(a).cmp(fold_chars(b))
}

/// Ephemeral predicate toggled from the blessing bar.
#[derive(Debug, Clone, PartialEq)]
pub struct QuickFilter {
    /// Identifier, stable for a given condition.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Condition an entity must meet.
    pub condition: BlessingCondition,
}

impl QuickFilter {
    /// Quick filter for `condition`.
    pub fn new(condition: BlessingCondition) -> Self {
        let id = match serde_json::to_value(&condition) {
            Ok(value) => format!(
                "{}:{}",
                value["attribute"].as_str().unwrap_or_default(),
                match &value["value"] {
                    serde_json::Value::String(text) => text.clone(),
                    other => other.to_string(),
                }
            ),
            Err(_) => condition.label(),
        };
        Self {
            id,
            label: condition.label(),
            condition,
        }
    }

    /// One quick filter per distinct condition of the active blessings.
    pub fn from_context(context: &BlessingContext) -> Vec<Self> {
        let mut conditions: Vec<_> = context
            .active()
            .map(|blessing| blessing.condition.clone())
            .collect();
        conditions.sort();
        conditions.dedup();
        conditions.into_iter().map(Self::new).collect()
    }

    /// Whether `entity` meets the condition.
    pub fn matches(&self, entity: &Entity) -> bool {
        self.condition.matches(entity)
    }
}

/// Sort, filter, quick filters and search combined.
#[derive(Debug, Clone)]
pub struct Query {
    sorter: Sorter,
    filter: Arc<dyn Filter>,
    quick_filters: Vec<QuickFilter>,
    search: String,
}

impl Query {
    /// Query with the given sorter and nothing else narrowing the list.
    pub fn new(sorter: Sorter) -> Self {
        Self {
            sorter,
            filter: Arc::new(RootFilter::empty()),
            quick_filters: Vec::new(),
            search: String::new(),
        }
    }

    /// Query resolving `sort` against `context`.
    pub fn from_sort(sort: &SortConfig, context: &BlessingContext) -> Self {
        Self::new(resolve(sort, context))
    }

    /// Replace the persisted filter.
    pub fn with_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filter = filter;
        self
    }

    /// Replace the quick filters.
    pub fn with_quick_filters(mut self, quick_filters: Vec<QuickFilter>) -> Self {
        self.quick_filters = quick_filters;
        self
    }

    /// Replace the search text.
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    /// Active sorter.
    pub fn sorter(&self) -> &Sorter {
        &self.sorter
    }

    /// Active filter.
    pub fn filter(&self) -> &Arc<dyn Filter> {
        &self.filter
    }

    /// Run the pipeline over `entities`.
    pub fn run(&self, entities: &EntityList) -> Vec<Arc<Entity>> {
        let needle = fold_text(self.search.trim());
        self.sorter
            .sort(entities)
            .into_iter()
            .filter(|entity| self.filter.includes(entity))
            .filter(|entity| {
                self.quick_filters.is_empty()
                    || self.quick_filters.iter().any(|quick| quick.matches(entity))
            })
            .filter(|entity| needle.is_empty() || matches_search(entity, &needle))
            .collect()
    }
}

fn matches_search(entity: &Entity, needle: &str) -> bool {
    entity.id == needle
        || fold_text(&entity.name).contains(needle)
        || fold_text(&entity.full_name).contains(needle)
}
