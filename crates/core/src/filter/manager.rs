use std::{collections::HashMap, sync::Arc};

use serde_json::Value;
use tracing::{debug, warn};

use super::{
    BlessedFactory, EntityFlag, EquipmentState, Filter, FilterConfig, FilterFactory, FlagFactory,
    NameFactory, OwnedFactory, PoseOption, PotentialFactory, RangeAttribute, RangeFactory,
    RootFactory, RootFilter, SelectFactory, ShardState, SkinState, SourceOption,
};
use crate::models::{BlessingContext, Class, Element, Rarity};

/// Registry resolving [`FilterConfig`] values into filters.
pub struct FilterManager {
    factories: HashMap<&'static str, Arc<dyn FilterFactory>>,
    context: BlessingContext,
}

impl FilterManager {
    /// Empty registry.
    pub fn new(context: BlessingContext) -> Self {
        Self {
            factories: HashMap::new(),
            context,
        }
    }

    /// Registry holding every built-in filter kind.
    pub fn with_builtins(context: BlessingContext) -> Self {
        let mut manager = Self::new(context);
        manager.register(RootFactory);
        manager.register(SelectFactory::<Rarity>::new());
        manager.register(SelectFactory::<Class>::new());
        manager.register(SelectFactory::<Element>::new());
        manager.register(SelectFactory::<ShardState>::new());
        manager.register(SelectFactory::<SkinState>::new());
        manager.register(SelectFactory::<EquipmentState>::new());
        manager.register(SelectFactory::<PoseOption>::new());
        manager.register(SelectFactory::<SourceOption>::new());
        manager.register(RangeFactory(RangeAttribute::Grade));
        manager.register(RangeFactory(RangeAttribute::MaxGrade));
        manager.register(RangeFactory(RangeAttribute::Level));
        manager.register(PotentialFactory);
        manager.register(OwnedFactory);
        manager.register(FlagFactory(EntityFlag::UpgradeReady));
        manager.register(FlagFactory(EntityFlag::QuestPending));
        manager.register(BlessedFactory);
        manager.register(NameFactory);
        manager
    }

    /// Add a factory, replacing any previous one of the same kind.
    pub fn register(&mut self, factory: impl FilterFactory + 'static) {
        let kind = factory.kind();
        if self.factories.insert(kind, Arc::new(factory)).is_some() {
            warn!("replacing filter factory for {kind}");
        }
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.factories.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Blessing context handed to factories.
    pub fn context(&self) -> &BlessingContext {
        &self.context
    }

    /// Swap the blessing context. Filters built earlier keep the old one.
    pub fn set_context(&mut self, context: BlessingContext) {
        self.context = context;
    }

    /// Resolve a config. Unknown kinds and configs without an opinion yield `None`.
    pub fn create_filter(&self, config: &FilterConfig) -> Option<Arc<dyn Filter>> {
        let kind = config.resolved_kind();
        let Some(factory) = self.factories.get(kind) else {
            warn!("ignoring filter {} of unknown type {kind}", config.id);
            return None;
        };
        let filter = factory.create(config, self, &self.context);
        if filter.is_none() {
            debug!("filter {} resolved to no filter", config.id);
        }
        filter
    }

    /// Rebuild a persisted root, tolerating stale or partial content.
    ///
    /// A non-root config is wrapped as the single child of a new root;
    /// anything unreadable yields the pass-all root.
    pub fn restore_root(&self, value: &Value) -> RootFilter {
        let config: FilterConfig = match serde_json::from_value(value.clone()) {
            Ok(config) => config,
            Err(err) => {
                warn!("discarding unreadable filter config: {err}");
                return RootFilter::empty();
            }
        };
        if config.resolved_kind() == RootFilter::KIND {
            return RootFilter::from_config(&config, self);
        }
        let children = self.create_filter(&config).into_iter().collect();
        RootFilter::new(RootFilter::KIND, children)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::fixtures::entity;

    fn samples() -> Vec<FilterConfig> {
        vec![
            FilterConfig::new("rarity").with_param("values", json!(["epic", "mythic"])),
            FilterConfig::new("class").with_param("values", json!(["know_how"])),
            FilterConfig::new("element").with_param("values", json!(["light", "sun"])),
            FilterConfig::new("shards").with_param("values", json!(["none", "partial"])),
            FilterConfig::new("skin").with_param("values", json!(["unlocked"])),
            FilterConfig::new("equipment").with_param("values", json!(["empty", "full"])),
            FilterConfig::new("pose").with_param("values", json!([2, 7])),
            FilterConfig::new("source").with_param("values", json!(["event", "pachinko"])),
            FilterConfig::new("grade").with_param("min", 1).with_param("max", 3),
            FilterConfig::new("max_grade").with_param("min", 5),
            FilterConfig::new("level").with_param("max", 350),
            FilterConfig::new("potential")
                .with_param("min", 1_250.5)
                .with_param("blessed", true),
            FilterConfig::new("owned").with_param("owned", false),
            FilterConfig::new("upgrade_ready"),
            FilterConfig::new("quest_pending"),
            FilterConfig::new("blessed"),
            FilterConfig::new("name").with_param("text", "Bunny"),
        ]
    }

    #[test]
    fn every_builtin_round_trips() {
        let manager = FilterManager::with_builtins(BlessingContext::empty());
        let configs = samples();
        let root_config = FilterConfig::new("root").with_param(
            "filters",
            configs
                .iter()
                .map(|config| serde_json::to_value(config).expect("serializable"))
                .collect::<Vec<_>>(),
        );

        for config in configs.iter().chain(std::iter::once(&root_config)) {
            let filter = manager
                .create_filter(config)
                .unwrap_or_else(|| panic!("{} should resolve", config.id));
            let produced = filter.config();
            assert_eq!(&produced, config);
            let again = manager.create_filter(&produced).expect("resolves again");
            assert_eq!(again.config(), produced);
        }

        let mut registered = manager.kinds();
        let mut covered: Vec<_> = configs.iter().map(|config| config.kind.as_str()).collect();
        covered.push("root");
        registered.sort_unstable();
        covered.sort_unstable();
        assert_eq!(registered, covered);
    }

    #[test]
    fn unknown_type_is_absent() {
        let manager = FilterManager::with_builtins(BlessingContext::empty());
        assert!(manager.create_filter(&FilterConfig::new("retired")).is_none());
    }

    #[test]
    fn restore_drops_one_bad_child_of_many() {
        let manager = FilterManager::with_builtins(BlessingContext::empty());
        let mut children: Vec<Value> = samples()
            .iter()
            .map(|config| serde_json::to_value(config).expect("serializable"))
            .collect();
        let total = children.len();
        children.insert(3, json!({"id": "bulb", "type": "bulb", "params": {"x": 1}}));

        let root = manager.restore_root(&json!({
            "id": "root",
            "type": "root",
            "params": {"filters": children}
        }));
        assert_eq!(root.children().len(), total);
    }

    #[test]
    fn restore_tolerates_garbage() {
        let manager = FilterManager::with_builtins(BlessingContext::empty());
        assert!(manager.restore_root(&json!("nonsense")).is_empty());
        assert!(manager.restore_root(&json!({"type": "root"})).is_empty());

        let single = manager.restore_root(&json!({"id": "owned"}));
        assert_eq!(single.children().len(), 1);
        assert!(single.includes(&entity("1")));
    }
}
