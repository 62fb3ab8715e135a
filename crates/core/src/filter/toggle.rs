use std::sync::Arc;

use super::{Filter, FilterConfig, FilterFactory, FilterManager};
use crate::{
    models::{BlessingContext, Entity},
    query::fold_text,
};

const OWNED: &str = "owned";
const TEXT: &str = "text";

/// Ownership filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedFilter {
    id: String,
    owned: bool,
}

impl OwnedFilter {
    /// Type string.
    pub const KIND: &'static str = "owned";

    /// Keep owned (`true`) or unowned (`false`) entities.
    pub fn new(id: impl Into<String>, owned: bool) -> Self {
        Self {
            id: id.into(),
            owned,
        }
    }
}

impl Filter for OwnedFilter {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        if self.owned { "Owned" } else { "Not owned" }.to_string()
    }

    fn includes(&self, entity: &Entity) -> bool {
        entity.own == self.owned
    }

    fn config(&self) -> FilterConfig {
        FilterConfig::new(Self::KIND)
            .with_id(self.id.clone())
            .with_param(OWNED, self.owned)
    }
}

/// Factory for [`OwnedFilter`]; a missing flag means owned.
#[derive(Debug, Default)]
pub struct OwnedFactory;

impl FilterFactory for OwnedFactory {
    fn kind(&self) -> &'static str {
        OwnedFilter::KIND
    }

    fn create(
        &self,
        config: &FilterConfig,
        _manager: &FilterManager,
        _context: &BlessingContext,
    ) -> Option<Arc<dyn Filter>> {
        let owned = config.bool_param(OWNED).unwrap_or(true);
        Some(Arc::new(OwnedFilter::new(config.id.clone(), owned)))
    }
}

/// Parameterless entity conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityFlag {
    /// Enough affection banked for the next grade.
    UpgradeReady,
    /// Upgrade quest line not finished.
    QuestPending,
}

impl EntityFlag {
    /// Filter type string.
    pub fn kind(self) -> &'static str {
        match self {
            Self::UpgradeReady => "upgrade_ready",
            Self::QuestPending => "quest_pending",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::UpgradeReady => "Upgrade ready",
            Self::QuestPending => "Quest pending",
        }
    }

    fn holds(self, entity: &Entity) -> bool {
        match self {
            Self::UpgradeReady => entity.upgrade_ready(),
            Self::QuestPending => entity
                .quest
                .as_ref()
                .map(|quest| !quest.completed)
                .unwrap_or(false),
        }
    }
}

/// Filter keeping entities for which an [`EntityFlag`] holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagFilter {
    id: String,
    flag: EntityFlag,
}

impl FlagFilter {
    /// Filter on `flag`.
    pub fn new(id: impl Into<String>, flag: EntityFlag) -> Self {
        Self { id: id.into(), flag }
    }
}

impl Filter for FlagFilter {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        self.flag.label().to_string()
    }

    fn includes(&self, entity: &Entity) -> bool {
        self.flag.holds(entity)
    }

    fn config(&self) -> FilterConfig {
        FilterConfig::new(self.flag.kind()).with_id(self.id.clone())
    }
}

/// Factory for one [`EntityFlag`].
#[derive(Debug, Clone, Copy)]
pub struct FlagFactory(pub EntityFlag);

impl FilterFactory for FlagFactory {
    fn kind(&self) -> &'static str {
        self.0.kind()
    }

    fn create(
        &self,
        config: &FilterConfig,
        _manager: &FilterManager,
        _context: &BlessingContext,
    ) -> Option<Arc<dyn Filter>> {
        Some(Arc::new(FlagFilter::new(config.id.clone(), self.0)))
    }
}

/// Keeps entities that benefit from an active blessing.
#[derive(Debug, Clone)]
pub struct BlessedFilter {
    id: String,
    context: BlessingContext,
}

impl BlessedFilter {
    /// Type string.
    pub const KIND: &'static str = "blessed";

    /// Filter against a captured blessing context.
    pub fn new(id: impl Into<String>, context: BlessingContext) -> Self {
        Self {
            id: id.into(),
            context,
        }
    }
}

impl Filter for BlessedFilter {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        "Blessed".to_string()
    }

    fn includes(&self, entity: &Entity) -> bool {
        self.context.is_blessed(entity)
    }

    fn config(&self) -> FilterConfig {
        FilterConfig::new(Self::KIND).with_id(self.id.clone())
    }
}

/// Factory for [`BlessedFilter`].
#[derive(Debug, Default)]
pub struct BlessedFactory;

impl FilterFactory for BlessedFactory {
    fn kind(&self) -> &'static str {
        BlessedFilter::KIND
    }

    fn create(
        &self,
        config: &FilterConfig,
        _manager: &FilterManager,
        context: &BlessingContext,
    ) -> Option<Arc<dyn Filter>> {
        Some(Arc::new(BlessedFilter::new(
            config.id.clone(),
            context.clone(),
        )))
    }
}

/// Persisted name search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameFilter {
    id: String,
    text: String,
    needle: String,
}

impl NameFilter {
    /// Type string.
    pub const KIND: &'static str = "name";

    /// Substring match on the names; blank text yields `None`.
    pub fn new(id: impl Into<String>, text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            id: id.into(),
            text: text.to_string(),
            needle: fold_text(text),
        })
    }
}

impl Filter for NameFilter {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        format!("Name contains \"{}\"", self.text)
    }

    fn includes(&self, entity: &Entity) -> bool {
        fold_text(&entity.name).contains(&self.needle)
            || fold_text(&entity.full_name).contains(&self.needle)
    }

    fn config(&self) -> FilterConfig {
        FilterConfig::new(Self::KIND)
            .with_id(self.id.clone())
            .with_param(TEXT, self.text.clone())
    }
}

/// Factory for [`NameFilter`].
#[derive(Debug, Default)]
pub struct NameFactory;

impl FilterFactory for NameFactory {
    fn kind(&self) -> &'static str {
        NameFilter::KIND
    }

    fn create(
        &self,
        config: &FilterConfig,
        _manager: &FilterManager,
        _context: &BlessingContext,
    ) -> Option<Arc<dyn Filter>> {
        let filter = NameFilter::new(config.id.clone(), config.str_param(TEXT)?)?;
        Some(Arc::new(filter))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::models::{fixtures::entity, Blessing, BlessingCondition, BlessingSet, QuestProgress};

    #[test]
    fn owned_filter_both_ways() {
        let mut girl = entity("1");
        assert!(OwnedFilter::new("owned", true).includes(&girl));
        girl.own = false;
        assert!(OwnedFilter::new("owned", false).includes(&girl));
        assert!(!OwnedFilter::new("owned", true).includes(&girl));
    }

    #[test]
    fn flags() {
        let mut girl = entity("1");
        girl.quest = Some(QuestProgress {
            step: Some("3".to_string()),
            completed: false,
        });
        assert!(FlagFilter::new("quest_pending", EntityFlag::QuestPending).includes(&girl));
        assert!(!FlagFilter::new("upgrade_ready", EntityFlag::UpgradeReady).includes(&girl));
        girl.affection = 1_000;
        assert!(FlagFilter::new("upgrade_ready", EntityFlag::UpgradeReady).includes(&girl));
    }

    #[test]
    fn blessed_filter_uses_context() {
        let now = Utc::now();
        let context = BlessingContext::new(
            BlessingSet {
                blessings: vec![Blessing {
                    title: "Pose 1".to_string(),
                    starts_at: now - Duration::hours(2),
                    ends_at: now + Duration::hours(2),
                    bonus_percent: 5.0,
                    condition: BlessingCondition::Pose(1),
                }],
            },
            now,
        );
        let mut girl = entity("1");
        let filter = BlessedFilter::new("blessed", context);
        assert!(filter.includes(&girl));
        girl.pose = 2;
        assert!(!filter.includes(&girl));
    }

    #[test]
    fn name_filter_folds_apostrophes() {
        let mut girl = entity("1");
        girl.name = "Jeanne d’Arc".to_string();
        let filter = NameFilter::new("name", "D'ARC").expect("non-blank");
        assert!(filter.includes(&girl));
        assert!(NameFilter::new("name", "   ").is_none());
    }
}
