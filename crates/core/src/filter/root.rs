use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use super::{Filter, FilterConfig, FilterFactory, FilterManager};
use crate::models::{BlessingContext, Entity};

/// AND of its child filters. No children matches everything.
#[derive(Debug, Clone)]
pub struct RootFilter {
    id: String,
    children: Vec<Arc<dyn Filter>>,
}

impl RootFilter {
    /// Type string of root filters.
    pub const KIND: &'static str = "root";
    /// Param holding the child configs.
    const CHILDREN: &'static str = "filters";

    /// Compose `children` under `id`.
    pub fn new(id: impl Into<String>, children: Vec<Arc<dyn Filter>>) -> Self {
        Self {
            id: id.into(),
            children,
        }
    }

    /// The pass-all root.
    pub fn empty() -> Self {
        Self::new(Self::KIND, Vec::new())
    }

    /// Resolve every child independently, dropping those that no longer
    /// resolve or no longer parse.
    pub fn from_config(config: &FilterConfig, manager: &FilterManager) -> Self {
        let children = config
            .list_param(Self::CHILDREN)
            .into_iter()
            .filter_map(parse_child)
            .filter_map(|child| manager.create_filter(&child))
            .collect();
        Self::new(config.id.clone(), children)
    }

    /// Resolved children, in order.
    pub fn children(&self) -> &[Arc<dyn Filter>] {
        &self.children
    }

    /// Whether the root has no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

fn parse_child(value: &Value) -> Option<FilterConfig> {
    match serde_json::from_value(value.clone()) {
        Ok(config) => Some(config),
        Err(err) => {
            warn!("dropping unreadable filter config {value}: {err}");
            None
        }
    }
}

impl Filter for RootFilter {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        if self.children.is_empty() {
            return "All".to_string();
        }
        self.children
            .iter()
            .map(|child| child.label())
            .collect::<Vec<_>>()
            .join(" & ")
    }

    fn includes(&self, entity: &Entity) -> bool {
        self.children.iter().all(|child| child.includes(entity))
    }

    fn config(&self) -> FilterConfig {
        let children: Vec<Value> = self
            .children
            .iter()
            .map(|child| serde_json::to_value(child.config()).unwrap_or(Value::Null))
            .collect();
        FilterConfig::new(Self::KIND)
            .with_id(self.id.clone())
            .with_param(Self::CHILDREN, children)
    }
}

/// Factory for [`RootFilter`]. Always yields a filter, possibly empty.
#[derive(Debug, Default)]
pub struct RootFactory;

impl FilterFactory for RootFactory {
    fn kind(&self) -> &'static str {
        RootFilter::KIND
    }

    fn create(
        &self,
        config: &FilterConfig,
        manager: &FilterManager,
        _context: &BlessingContext,
    ) -> Option<Arc<dyn Filter>> {
        Some(Arc::new(RootFilter::from_config(config, manager)))
    }
}
