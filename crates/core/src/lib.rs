#![warn(clippy::all, missing_docs)]

//! Core logic for the roster client.
//!
//! This crate keeps a local snapshot of a remote entity collection in step
//! with a rate-limited upstream API and exposes the read path over it:
//! composable filters, deterministic sorters and the query pipeline that
//! combines them. Front ends only consume these types.

pub mod cache;
pub mod config;
pub mod filter;
pub mod models;
pub mod query;
pub mod scheduler;
pub mod sort;
pub mod sync;

pub use cache::{CacheStore, FileCache, MemoryCache, PersistentCache};
pub use config::AppConfig;
pub use filter::{Filter, FilterConfig, FilterManager, FilterSelection, RootFilter};
pub use models::{BlessingContext, BlessingSet, Entity, EntityList};
pub use query::{Query, QuickFilter};
pub use scheduler::{Scheduler, SchedulerError, SchedulerEvent};
pub use sort::{SortConfig, SortDirection, Sorter};
pub use sync::{
    Action, DataSource, HttpUpstream, JsonNormalizer, SyncError, SyncEvent, SyncPhase,
    Synchronizer, Upstream,
};
