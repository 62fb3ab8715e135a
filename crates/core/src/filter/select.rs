use std::{collections::BTreeSet, fmt, marker::PhantomData, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Filter, FilterConfig, FilterFactory, FilterManager};
use crate::models::{BlessingContext, Class, Element, Entity, Rarity};

const VALUES: &str = "values";
const COMPLETE_SHARDS: u32 = 100;

/// One checkbox of a multi-select filter.
pub trait SelectOption: Clone + Ord + fmt::Debug + Send + Sync + 'static {
    /// Filter type string.
    const KIND: &'static str;
    /// Category name used in labels.
    const TITLE: &'static str;

    /// Parse one entry of `params.values`; unknown entries yield `None`.
    fn from_value(value: &Value) -> Option<Self>;
    /// Serialise for `params.values`.
    fn to_value(&self) -> Value;
    /// Display text of the option.
    fn label(&self) -> String;
    /// Whether `entity` falls under this option.
    fn matches(&self, entity: &Entity) -> bool;
}

/// OR of the selected options of one category.
///
/// Selections are kept sorted so the config is independent of click order.
#[derive(Debug, Clone)]
pub struct SelectFilter<O: SelectOption> {
    id: String,
    selected: BTreeSet<O>,
}

impl<O: SelectOption> SelectFilter<O> {
    /// Build from a selection; an empty selection is no filter at all.
    pub fn new(id: impl Into<String>, selected: impl IntoIterator<Item = O>) -> Option<Self> {
        let selected: BTreeSet<O> = selected.into_iter().collect();
        if selected.is_empty() {
            return None;
        }
        Some(Self {
            id: id.into(),
            selected,
        })
    }

    /// Selected options in canonical order.
    pub fn selected(&self) -> impl Iterator<Item = &O> {
        self.selected.iter()
    }
}

impl<O: SelectOption> Filter for SelectFilter<O> {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        let options: Vec<String> = self.selected.iter().map(O::label).collect();
        format!("{}: {}", O::TITLE, options.join(" or "))
    }

    fn includes(&self, entity: &Entity) -> bool {
        self.selected.iter().any(|option| option.matches(entity))
    }

    fn config(&self) -> FilterConfig {
        let values: Vec<Value> = self.selected.iter().map(O::to_value).collect();
        FilterConfig::new(O::KIND)
            .with_id(self.id.clone())
            .with_param(VALUES, values)
    }
}

/// Factory for a [`SelectFilter`] over option type `O`.
pub struct SelectFactory<O>(PhantomData<fn() -> O>);

impl<O> SelectFactory<O> {
    /// New factory.
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<O> Default for SelectFactory<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: SelectOption> FilterFactory for SelectFactory<O> {
    fn kind(&self) -> &'static str {
        O::KIND
    }

    fn create(
        &self,
        config: &FilterConfig,
        _manager: &FilterManager,
        _context: &BlessingContext,
    ) -> Option<Arc<dyn Filter>> {
        let options = config
            .list_param(VALUES)
            .into_iter()
            .filter_map(O::from_value);
        let filter = SelectFilter::new(config.id.clone(), options)?;
        Some(Arc::new(filter))
    }
}

macro_rules! attribute_option {
    ($ty:ty, $kind:literal, $title:literal, $field:ident) => {
        impl SelectOption for $ty {
            const KIND: &'static str = $kind;
            const TITLE: &'static str = $title;

            fn from_value(value: &Value) -> Option<Self> {
                serde_json::from_value(value.clone()).ok()
            }

            fn to_value(&self) -> Value {
                Value::String(self.as_str().to_string())
            }

            fn label(&self) -> String {
                self.as_str().replace('_', " ")
            }

            fn matches(&self, entity: &Entity) -> bool {
                entity.$field == *self
            }
        }
    };
}

attribute_option!(Rarity, "rarity", "Rarity", rarity);
attribute_option!(Class, "class", "Class", class);
attribute_option!(Element, "element", "Element", element);

/// Shard collection progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardState {
    /// No shards and not owned.
    None,
    /// Some shards but not owned yet.
    Partial,
    /// Owned, or enough shards to be.
    Complete,
}

impl ShardState {
    fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Partial => "partial",
            Self::Complete => "complete",
        }
    }

    fn of(entity: &Entity) -> Self {
        if entity.own || entity.shards >= COMPLETE_SHARDS {
            Self::Complete
        } else if entity.shards > 0 {
            Self::Partial
        } else {
            Self::None
        }
    }
}

/// Alternative artwork availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkinState {
    /// The entity has no skins.
    None,
    /// At least one skin is still locked.
    Locked,
    /// Every skin is unlocked.
    Unlocked,
}

impl SkinState {
    fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
        }
    }

    fn of(entity: &Entity) -> Self {
        if entity.skins.is_empty() {
            Self::None
        } else if entity.skins.iter().all(|skin| skin.unlocked) {
            Self::Unlocked
        } else {
            Self::Locked
        }
    }
}

/// How many equipment slots are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentState {
    /// Nothing equipped, or not equippable.
    Empty,
    /// Some slots filled.
    Partial,
    /// Every slot filled.
    Full,
}

impl EquipmentState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Partial => "partial",
            Self::Full => "full",
        }
    }

    fn of(entity: &Entity) -> Self {
        match &entity.equipment {
            Some(equipment) if equipment.is_full() => Self::Full,
            Some(equipment) if !equipment.items.is_empty() => Self::Partial,
            _ => Self::Empty,
        }
    }
}

macro_rules! derived_option {
    ($ty:ty, $kind:literal, $title:literal) => {
        impl SelectOption for $ty {
            const KIND: &'static str = $kind;
            const TITLE: &'static str = $title;

            fn from_value(value: &Value) -> Option<Self> {
                serde_json::from_value(value.clone()).ok()
            }

            fn to_value(&self) -> Value {
                Value::String(self.as_str().to_string())
            }

            fn label(&self) -> String {
                self.as_str().to_string()
            }

            fn matches(&self, entity: &Entity) -> bool {
                <$ty>::of(entity) == *self
            }
        }
    };
}

derived_option!(ShardState, "shards", "Shards");
derived_option!(SkinState, "skin", "Skins");
derived_option!(EquipmentState, "equipment", "Equipment");

/// Pose index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoseOption(pub u32);

impl SelectOption for PoseOption {
    const KIND: &'static str = "pose";
    const TITLE: &'static str = "Pose";

    fn from_value(value: &Value) -> Option<Self> {
        value
            .as_u64()
            .and_then(|pose| u32::try_from(pose).ok())
            .map(Self)
    }

    fn to_value(&self) -> Value {
        Value::from(self.0)
    }

    fn label(&self) -> String {
        self.0.to_string()
    }

    fn matches(&self, entity: &Entity) -> bool {
        entity.pose == self.0
    }
}

/// Where an entity is obtained. Free-form, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceOption(pub String);

impl SelectOption for SourceOption {
    const KIND: &'static str = "source";
    const TITLE: &'static str = "Source";

    fn from_value(value: &Value) -> Option<Self> {
        value
            .as_str()
            .map(str::trim)
            .filter(|source| !source.is_empty())
            .map(|source| Self(source.to_lowercase()))
    }

    fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }

    fn label(&self) -> String {
        self.0.clone()
    }

    fn matches(&self, entity: &Entity) -> bool {
        entity
            .source
            .as_deref()
            .map(|source| source.eq_ignore_ascii_case(&self.0))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::{fixtures::entity, Equipment, EquipmentItem, Skin};

    fn create<O: SelectOption>(values: Value) -> Option<Arc<dyn Filter>> {
        let config = FilterConfig::new(O::KIND).with_param(VALUES, values);
        let manager = FilterManager::new(BlessingContext::empty());
        SelectFactory::<O>::new().create(&config, &manager, manager.context())
    }

    #[test]
    fn rarity_options_are_or_composed() {
        let filter = create::<Rarity>(json!(["legendary", "epic"])).expect("non-empty selection");

        let mut legendary = entity("1");
        legendary.rarity = Rarity::Legendary;
        let mut rare = entity("2");
        rare.rarity = Rarity::Rare;

        assert!(filter.includes(&legendary));
        assert!(!filter.includes(&rare));
        assert_eq!(filter.label(), "Rarity: epic or legendary");
    }

    #[test]
    fn empty_or_unknown_selection_is_absent() {
        assert!(create::<Rarity>(json!([])).is_none());
        assert!(create::<Rarity>(json!(["ultra_rare"])).is_none());
        assert!(SelectFilter::<Class>::new("class", Vec::new()).is_none());
    }

    #[test]
    fn config_is_canonical() {
        let filter = create::<Element>(json!(["water", "fire", "water", "plasma"]))
            .expect("known elements selected");
        assert_eq!(filter.config().params["values"], json!(["fire", "water"]));
    }

    #[test]
    fn shard_states() {
        let filter = create::<ShardState>(json!(["partial"])).expect("selection");
        let mut girl = entity("1");
        girl.own = false;
        girl.shards = 40;
        assert!(filter.includes(&girl));
        girl.shards = 0;
        assert!(!filter.includes(&girl));
        girl.own = true;
        assert!(!filter.includes(&girl));
    }

    #[test]
    fn skin_and_equipment_states() {
        let mut girl = entity("1");
        girl.skins = vec![
            Skin {
                id: "a".to_string(),
                unlocked: true,
            },
            Skin {
                id: "b".to_string(),
                unlocked: false,
            },
        ];
        girl.equipment = Some(Equipment {
            slots: 2,
            items: vec![EquipmentItem {
                slot: 0,
                rarity: Rarity::Epic,
                level: 10,
            }],
        });

        let skins = create::<SkinState>(json!(["locked"])).expect("selection");
        let equipment = create::<EquipmentState>(json!(["full"])).expect("selection");
        assert!(skins.includes(&girl));
        assert!(!equipment.includes(&girl));
        assert_eq!(EquipmentState::of(&girl), EquipmentState::Partial);
    }

    #[test]
    fn source_and_pose() {
        let mut girl = entity("1");
        girl.source = Some("Event".to_string());
        girl.pose = 3;

        let source = create::<SourceOption>(json!(["event", "  "])).expect("selection");
        let pose = create::<PoseOption>(json!([1, 2])).expect("selection");
        assert!(source.includes(&girl));
        assert!(!pose.includes(&girl));
    }
}
