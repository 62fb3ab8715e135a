use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Class, Element, Entity, Rarity};

/// Decimal places kept when deriving blessed power values.
const POWER_PRECISION: f64 = 1_000.0;

/// Attribute a blessing applies to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "attribute", content = "value", rename_all = "snake_case")]
pub enum BlessingCondition {
    /// Matches a rarity tier.
    Rarity(Rarity),
    /// Matches an element.
    Element(Element),
    /// Matches a stat class.
    Class(Class),
    /// Matches a pose index.
    Pose(u32),
    /// Matches an eye colour (case-insensitive).
    EyeColor(String),
    /// Matches a hair colour (case-insensitive).
    HairColor(String),
    /// Matches a zodiac sign (case-insensitive).
    Zodiac(String),
}

impl BlessingCondition {
    /// Whether `entity` satisfies the condition.
    pub fn matches(&self, entity: &Entity) -> bool {
        fn same(left: &Option<String>, right: &str) -> bool {
            left.as_deref()
                .map(|value| value.eq_ignore_ascii_case(right))
                .unwrap_or(false)
        }

        match self {
            Self::Rarity(rarity) => entity.rarity == *rarity,
            Self::Element(element) => entity.element == *element,
            Self::Class(class) => entity.class == *class,
            Self::Pose(pose) => entity.pose == *pose,
            Self::EyeColor(color) => same(&entity.traits.eye_color, color),
            Self::HairColor(color) => same(&entity.traits.hair_color, color),
            Self::Zodiac(sign) => same(&entity.traits.zodiac, sign),
        }
    }

    /// Short human readable description.
    pub fn label(&self) -> String {
        match self {
            Self::Rarity(rarity) => format!("Rarity: {}", rarity.as_str()),
            Self::Element(element) => format!("Element: {}", element.as_str()),
            Self::Class(class) => format!("Class: {}", class.as_str()),
            Self::Pose(pose) => format!("Pose: {pose}"),
            Self::EyeColor(color) => format!("Eye colour: {color}"),
            Self::HairColor(color) => format!("Hair colour: {color}"),
            Self::Zodiac(sign) => format!("Zodiac: {sign}"),
        }
    }
}

/// Time-boxed bonus applied to entities matching a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blessing {
    /// Display title.
    pub title: String,
    /// Start of the active window.
    pub starts_at: DateTime<Utc>,
    /// End of the active window (exclusive).
    pub ends_at: DateTime<Utc>,
    /// Power bonus in percent.
    pub bonus_percent: f64,
    /// Which entities benefit.
    pub condition: BlessingCondition,
}

impl Blessing {
    /// Whether the blessing is active at `at`.
    pub fn is_active(&self, at: DateTime<Utc>) -> bool {
        self.starts_at <= at && at < self.ends_at
    }
}

/// Every blessing known from the last successful fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlessingSet {
    /// Current and upcoming blessings.
    #[serde(default)]
    pub blessings: Vec<Blessing>,
}

impl BlessingSet {
    /// Blessings active at `at`.
    pub fn active_at(&self, at: DateTime<Utc>) -> impl Iterator<Item = &Blessing> {
        self.blessings
            .iter()
            .filter(move |blessing| blessing.is_active(at))
    }
}

/// Blessing data frozen at a point in time.
///
/// Filters and sorters capture a context by value so a later blessing
/// refresh never changes the result of an already-built predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct BlessingContext {
    /// Known blessings.
    pub blessings: BlessingSet,
    /// Instant used to decide which blessings are active.
    pub at: DateTime<Utc>,
}

impl BlessingContext {
    /// Build a context evaluated at `at`.
    pub fn new(blessings: BlessingSet, at: DateTime<Utc>) -> Self {
        Self { blessings, at }
    }

    /// Context with no blessings.
    pub fn empty() -> Self {
        Self::new(BlessingSet::default(), Utc::now())
    }

    /// Blessings active at the context instant.
    pub fn active(&self) -> impl Iterator<Item = &Blessing> {
        self.blessings.active_at(self.at)
    }

    /// Whether any active blessing applies to `entity`.
    pub fn is_blessed(&self, entity: &Entity) -> bool {
        self.active()
            .any(|blessing| blessing.condition.matches(entity))
    }

    /// Summed bonus percent of the active blessings matching `entity`.
    pub fn bonus_for(&self, entity: &Entity) -> f64 {
        self.active()
            .filter(|blessing| blessing.condition.matches(entity))
            .map(|blessing| blessing.bonus_percent)
            .sum()
    }

    /// Potential power under the active blessings.
    pub fn blessed_potential(&self, entity: &Entity) -> f64 {
        round_power(entity.potential * (1.0 + self.bonus_for(entity) / 100.0))
    }
}

/// Round a derived power value so float noise never crosses a threshold.
pub(crate) fn round_power(value: f64) -> f64 {
    (value * POWER_PRECISION).round() / POWER_PRECISION
}
