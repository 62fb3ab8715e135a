//! Composable, serialisable entity filters.
//!
//! Every runtime filter sits behind the [`Filter`] trait and can describe
//! itself as a plain [`FilterConfig`]. A [`FilterManager`] turns configs back
//! into filters through a registry of [`FilterFactory`] values keyed by the
//! config's `type`.
//!
//! Composition is AND at the [`RootFilter`] and OR inside a single
//! multi-select filter. A factory returning `None` means "no filter here",
//! which is different from a filter that matches nothing.

mod descriptor;
mod manager;
mod range;
mod root;
mod select;
mod selection;
mod toggle;

use std::{fmt, sync::Arc};

use crate::models::{BlessingContext, Entity};

pub use descriptor::FilterConfig;
pub use manager::FilterManager;
pub use range::{PotentialFactory, PotentialFilter, RangeAttribute, RangeFactory, RangeFilter};
pub use root::{RootFactory, RootFilter};
pub use select::{
    EquipmentState, PoseOption, SelectFactory, SelectFilter, SelectOption, ShardState, SkinState,
    SourceOption,
};
pub use selection::{FilterSelection, FilterSlot};
pub use toggle::{
    BlessedFactory, BlessedFilter, EntityFlag, FlagFactory, FlagFilter, NameFactory, NameFilter,
    OwnedFactory, OwnedFilter,
};

/// A pure predicate over entities that can describe itself.
pub trait Filter: Send + Sync + fmt::Debug {
    /// Identifier of this filter instance.
    fn id(&self) -> &str;

    /// Human readable summary.
    fn label(&self) -> String;

    /// Whether `entity` passes the filter.
    fn includes(&self, entity: &Entity) -> bool;

    /// Serialisable descriptor that recreates an equal filter.
    fn config(&self) -> FilterConfig;
}

/// Builds one kind of filter from its descriptor.
pub trait FilterFactory: Send + Sync {
    /// The `type` string this factory handles.
    fn kind(&self) -> &'static str;

    /// Build a filter, or `None` when the config holds no usable opinion
    /// for this context.
    fn create(
        &self,
        config: &FilterConfig,
        manager: &FilterManager,
        context: &BlessingContext,
    ) -> Option<Arc<dyn Filter>>;
}
