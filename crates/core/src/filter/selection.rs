use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Filter, FilterConfig, FilterManager, RootFilter};

/// One user-configured filter and whether it is switched on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSlot {
    /// Last parameters the user chose.
    pub config: FilterConfig,
    /// Whether the filter takes part in the root.
    pub enabled: bool,
}

/// The user's filter panel.
///
/// Disabling a filter keeps its parameters so enabling it again restores
/// them. Only enabled slots reach the root filter, and slots whose config
/// resolves to no filter (an empty multi-select, say) are left out of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSelection {
    slots: Vec<FilterSlot>,
}

impl FilterSelection {
    /// Empty panel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Panel with every child of a root config enabled.
    pub fn from_root(config: &FilterConfig) -> Self {
        let slots = config
            .list_param("filters")
            .into_iter()
            .filter_map(|value| serde_json::from_value::<FilterConfig>(value.clone()).ok())
            .map(|config| FilterSlot {
                config,
                enabled: true,
            })
            .collect();
        Self { slots }
    }

    /// Slots in panel order.
    pub fn slots(&self) -> &[FilterSlot] {
        &self.slots
    }

    /// Slot with the given id.
    pub fn get(&self, id: &str) -> Option<&FilterSlot> {
        self.slots.iter().find(|slot| slot.config.id == id)
    }

    /// Store `config` and enable it, replacing a slot with the same id in place.
    pub fn set(&mut self, config: FilterConfig) {
        match self.slots.iter_mut().find(|slot| slot.config.id == config.id) {
            Some(slot) => {
                slot.config = config;
                slot.enabled = true;
            }
            None => self.slots.push(FilterSlot {
                config,
                enabled: true,
            }),
        }
    }

    /// Switch a slot on or off. Returns `false` when no slot has that id.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> bool {
        match self.slots.iter_mut().find(|slot| slot.config.id == id) {
            Some(slot) => {
                slot.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Flip a slot, returning its new state.
    pub fn toggle(&mut self, id: &str) -> Option<bool> {
        let slot = self.slots.iter_mut().find(|slot| slot.config.id == id)?;
        slot.enabled = !slot.enabled;
        Some(slot.enabled)
    }

    /// Drop a slot entirely.
    pub fn remove(&mut self, id: &str) -> Option<FilterConfig> {
        let index = self.slots.iter().position(|slot| slot.config.id == id)?;
        Some(self.slots.remove(index).config)
    }

    /// Root config of the enabled slots, suitable for persisting.
    pub fn root_config(&self) -> FilterConfig {
        let children: Vec<Value> = self
            .enabled()
            .filter_map(|config| serde_json::to_value(config).ok())
            .collect();
        FilterConfig::new(RootFilter::KIND).with_param("filters", children)
    }

    /// Resolve the enabled slots into a root filter.
    pub fn build(&self, manager: &FilterManager) -> RootFilter {
        let children = self
            .enabled()
            .filter_map(|config| manager.create_filter(config))
            .collect();
        RootFilter::new(RootFilter::KIND, children)
    }

    fn enabled(&self) -> impl Iterator<Item = &FilterConfig> {
        self.slots
            .iter()
            .filter(|slot| slot.enabled)
            .map(|slot| &slot.config)
    }
}

impl From<&RootFilter> for FilterSelection {
    fn from(root: &RootFilter) -> Self {
        Self::from_root(&root.config())
    }
}
