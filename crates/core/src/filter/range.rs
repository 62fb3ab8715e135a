use std::sync::Arc;

use super::{Filter, FilterConfig, FilterFactory, FilterManager};
use crate::models::{round_power, BlessingContext, Entity};

const MIN: &str = "min";
const MAX: &str = "max";
const BLESSED: &str = "blessed";

/// Integer attribute a [`RangeFilter`] bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeAttribute {
    /// Current grade (`stars`).
    Grade,
    /// Maximum grade (`max_stars`).
    MaxGrade,
    /// Current level.
    Level,
}

impl RangeAttribute {
    /// Filter type string.
    pub fn kind(self) -> &'static str {
        match self {
            Self::Grade => "grade",
            Self::MaxGrade => "max_grade",
            Self::Level => "level",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Grade => "Grade",
            Self::MaxGrade => "Max grade",
            Self::Level => "Level",
        }
    }

    fn value(self, entity: &Entity) -> u32 {
        match self {
            Self::Grade => entity.stars,
            Self::MaxGrade => entity.max_stars,
            Self::Level => entity.level,
        }
    }
}

fn describe<T: std::fmt::Display>(title: &str, min: Option<T>, max: Option<T>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("{title} {min}–{max}"),
        (Some(min), None) => format!("{title} ≥ {min}"),
        (None, Some(max)) => format!("{title} ≤ {max}"),
        (None, None) => format!("{title} any"),
    }
}

/// Inclusive bounds on an integer attribute; a missing bound is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeFilter {
    id: String,
    attribute: RangeAttribute,
    min: Option<u32>,
    max: Option<u32>,
}

impl RangeFilter {
    /// Build a range. Two open bounds hold no opinion and yield `None`.
    pub fn new(
        id: impl Into<String>,
        attribute: RangeAttribute,
        min: Option<u32>,
        max: Option<u32>,
    ) -> Option<Self> {
        if min.is_none() && max.is_none() {
            return None;
        }
        Some(Self {
            id: id.into(),
            attribute,
            min,
            max,
        })
    }
}

impl Filter for RangeFilter {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        describe(self.attribute.title(), self.min, self.max)
    }

    fn includes(&self, entity: &Entity) -> bool {
        let value = self.attribute.value(entity);
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    fn config(&self) -> FilterConfig {
        let mut config = FilterConfig::new(self.attribute.kind()).with_id(self.id.clone());
        if let Some(min) = self.min {
            config = config.with_param(MIN, min);
        }
        if let Some(max) = self.max {
            config = config.with_param(MAX, max);
        }
        config
    }
}

/// Factory for one [`RangeAttribute`].
#[derive(Debug, Clone, Copy)]
pub struct RangeFactory(pub RangeAttribute);

impl FilterFactory for RangeFactory {
    fn kind(&self) -> &'static str {
        self.0.kind()
    }

    fn create(
        &self,
        config: &FilterConfig,
        _manager: &FilterManager,
        _context: &BlessingContext,
    ) -> Option<Arc<dyn Filter>> {
        let filter = RangeFilter::new(
            config.id.clone(),
            self.0,
            config.u32_param(MIN),
            config.u32_param(MAX),
        )?;
        Some(Arc::new(filter))
    }
}

/// Inclusive bounds on potential power, optionally under current blessings.
///
/// The blessing context is captured when the filter is built; the config
/// only records whether blessings apply.
#[derive(Debug, Clone)]
pub struct PotentialFilter {
    id: String,
    min: Option<f64>,
    max: Option<f64>,
    blessed: bool,
    context: BlessingContext,
}

impl PotentialFilter {
    /// Type string.
    pub const KIND: &'static str = "potential";

    /// Build a threshold. Two open bounds yield `None`.
    pub fn new(
        id: impl Into<String>,
        min: Option<f64>,
        max: Option<f64>,
        blessed: bool,
        context: BlessingContext,
    ) -> Option<Self> {
        if min.is_none() && max.is_none() {
            return None;
        }
        Some(Self {
            id: id.into(),
            min,
            max,
            blessed,
            context,
        })
    }

    fn potential(&self, entity: &Entity) -> f64 {
        if self.blessed {
            self.context.blessed_potential(entity)
        } else {
            round_power(entity.potential)
        }
    }
}

impl Filter for PotentialFilter {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> String {
        let title = if self.blessed {
            "Blessed potential"
        } else {
            "Potential"
        };
        describe(title, self.min, self.max)
    }

    fn includes(&self, entity: &Entity) -> bool {
        let value = self.potential(entity);
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    fn config(&self) -> FilterConfig {
        let mut config = FilterConfig::new(Self::KIND).with_id(self.id.clone());
        if let Some(min) = self.min {
            config = config.with_param(MIN, min);
        }
        if let Some(max) = self.max {
            config = config.with_param(MAX, max);
        }
        if self.blessed {
            config = config.with_param(BLESSED, true);
        }
        config
    }
}

/// Factory for [`PotentialFilter`].
#[derive(Debug, Default)]
pub struct PotentialFactory;

impl FilterFactory for PotentialFactory {
    fn kind(&self) -> &'static str {
        PotentialFilter::KIND
    }

    fn create(
        &self,
        config: &FilterConfig,
        _manager: &FilterManager,
        context: &BlessingContext,
    ) -> Option<Arc<dyn Filter>> {
        let filter = PotentialFilter::new(
            config.id.clone(),
            config.f64_param(MIN).filter(|n| n.is_finite()),
            config.f64_param(MAX).filter(|n| n.is_finite()),
            config.bool_param(BLESSED).unwrap_or(false),
            context.clone(),
        )?;
        Some(Arc::new(filter))
    }
}
