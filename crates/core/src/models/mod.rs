//! Shared domain models.

mod blessing;
mod list;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use blessing::{Blessing, BlessingCondition, BlessingContext, BlessingSet};
pub(crate) use blessing::round_power;
pub use list::EntityList;

/// Rarity tier of an entity, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    /// Granted at account creation.
    Starting,
    /// Common tier.
    Common,
    /// Rare tier.
    Rare,
    /// Epic tier.
    Epic,
    /// Legendary tier.
    Legendary,
    /// Mythic tier.
    Mythic,
}

impl Rarity {
    /// Wire name of the rarity.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Common => "common",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
            Self::Mythic => "mythic",
        }
    }
}

/// Main stat class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Class {
    /// Hardcore class.
    Hardcore,
    /// Charm class.
    Charm,
    /// Know-how class.
    KnowHow,
}

impl Class {
    /// Wire name of the class.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hardcore => "hardcore",
            Self::Charm => "charm",
            Self::KnowHow => "know_how",
        }
    }
}

/// Elemental affinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    /// Darkness.
    Darkness,
    /// Light.
    Light,
    /// Psychic.
    Psychic,
    /// Fire.
    Fire,
    /// Nature.
    Nature,
    /// Stone.
    Stone,
    /// Sun.
    Sun,
    /// Water.
    Water,
}

impl Element {
    /// Wire name of the element.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Darkness => "darkness",
            Self::Light => "light",
            Self::Psychic => "psychic",
            Self::Fire => "fire",
            Self::Nature => "nature",
            Self::Stone => "stone",
            Self::Sun => "sun",
            Self::Water => "water",
        }
    }
}

/// Cosmetic attributes some blessings key on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Traits {
    /// Eye colour.
    #[serde(default)]
    pub eye_color: Option<String>,
    /// Hair colour.
    #[serde(default)]
    pub hair_color: Option<String>,
    /// Zodiac sign.
    #[serde(default)]
    pub zodiac: Option<String>,
}

/// Alternative artwork for an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skin {
    /// Skin identifier.
    pub id: String,
    /// Whether the player has unlocked it.
    #[serde(default)]
    pub unlocked: bool,
}

/// Equipment slots and the items currently placed in them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    /// Number of available slots.
    pub slots: u32,
    /// Equipped items.
    #[serde(default)]
    pub items: Vec<EquipmentItem>,
}

impl Equipment {
    /// True when every slot holds an item.
    pub fn is_full(&self) -> bool {
        self.slots > 0 && self.items.len() as u32 >= self.slots
    }
}

/// One equipped item. Opaque to the core beyond its slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentItem {
    /// Slot index the item occupies.
    pub slot: u32,
    /// Item rarity.
    pub rarity: Rarity,
    /// Item level.
    #[serde(default)]
    pub level: u32,
}

/// Progress through an entity's upgrade quest line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestProgress {
    /// Identifier of the next quest step, if any.
    #[serde(default)]
    pub step: Option<String>,
    /// Whether the whole quest line is done.
    #[serde(default)]
    pub completed: bool,
}

/// One member of the synchronised collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identifier.
    pub id: String,
    /// Short display name.
    pub name: String,
    /// Full name, may be empty.
    #[serde(default)]
    pub full_name: String,
    /// Whether the player owns this entity.
    #[serde(default)]
    pub own: bool,
    /// Rarity tier.
    pub rarity: Rarity,
    /// Main stat class.
    pub class: Class,
    /// Elemental affinity.
    pub element: Element,
    /// Current level.
    #[serde(default)]
    pub level: u32,
    /// Level cap.
    #[serde(default)]
    pub max_level: u32,
    /// Current grade.
    #[serde(default)]
    pub stars: u32,
    /// Maximum grade.
    #[serde(default)]
    pub max_stars: u32,
    /// Pose index used by some blessings.
    #[serde(default)]
    pub pose: u32,
    /// Collected shards (100 unlocks the entity).
    #[serde(default)]
    pub shards: u32,
    /// Where the entity can be obtained.
    #[serde(default)]
    pub source: Option<String>,
    /// Current power.
    #[serde(default)]
    pub power: f64,
    /// Power at maximum level and grade, supplied by the import step.
    #[serde(default)]
    pub potential: f64,
    /// Accumulated affection.
    #[serde(default)]
    pub affection: u64,
    /// Affection needed for the next grade, if another grade exists.
    #[serde(default)]
    pub next_grade_affection: Option<u64>,
    /// Salary per collection.
    #[serde(default)]
    pub salary: u64,
    /// Salary normalised to one hour.
    #[serde(default)]
    pub salary_per_hour: f64,
    /// Cosmetic traits.
    #[serde(default)]
    pub traits: Traits,
    /// Alternative artwork.
    #[serde(default)]
    pub skins: Vec<Skin>,
    /// Equipment, when the entity can be equipped.
    #[serde(default)]
    pub equipment: Option<Equipment>,
    /// Upgrade quest progress.
    #[serde(default)]
    pub quest: Option<QuestProgress>,
    /// When the entity was obtained.
    #[serde(default)]
    pub obtained_at: Option<DateTime<Utc>>,
}

impl Entity {
    /// Cheap comparison of the fields that drive a re-render.
    ///
    /// Two entities that are quick-equal are interchangeable for display
    /// purposes even when deeper fields differ.
    pub fn quick_eq(&self, other: &Entity) -> bool {
        self.id == other.id
            && self.own == other.own
            && self.level == other.level
            && self.stars == other.stars
            && self.max_stars == other.max_stars
            && self.pose == other.pose
            && self.shards == other.shards
            && self.affection == other.affection
            && self.salary == other.salary
            && self.power == other.power
            && self.unlocked_skins() == other.unlocked_skins()
            && self.equipped_items() == other.equipped_items()
            && self.quest == other.quest
    }

    /// Number of unlocked skins.
    pub fn unlocked_skins(&self) -> usize {
        self.skins.iter().filter(|skin| skin.unlocked).count()
    }

    /// Number of equipped items.
    pub fn equipped_items(&self) -> usize {
        self.equipment
            .as_ref()
            .map(|equipment| equipment.items.len())
            .unwrap_or(0)
    }

    /// Whether enough affection is stored to buy the next grade.
    pub fn upgrade_ready(&self) -> bool {
        self.own
            && self.stars < self.max_stars
            && self
                .next_grade_affection
                .map(|needed| self.affection >= needed)
                .unwrap_or(false)
    }

    /// Label combining short and full name when they differ.
    pub fn display_name(&self) -> String {
        if self.full_name.is_empty() || self.full_name == self.name {
            self.name.clone()
        } else {
            format!("{} · {}", self.name, self.full_name)
        }
    }
}
