//! Persistent key/value cache for snapshots and user defaults.
//!
//! Backends only move JSON values around. [`CacheStore`] layers the typed
//! entries on top and treats anything unreadable as a cache miss.

mod file;
mod memory;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    filter::{Filter, FilterManager, RootFilter},
    models::{BlessingSet, Entity, EntityList},
    sort::SortConfig,
};

pub use file::FileCache;
pub use memory::MemoryCache;

/// Asynchronous key/value store that survives restarts.
#[async_trait]
pub trait PersistentCache: Send + Sync {
    /// Whether `key` holds a value.
    async fn has(&self, key: &str) -> Result<bool>;
    /// Value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: &Value) -> Result<()>;
    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Key names used by the synchroniser.
///
/// Snapshot keys carry the schema generation as a `_v{n}` suffix; defaults
/// are unversioned because restoring them already tolerates stale content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    namespace: String,
    version: u32,
}

impl CacheKeys {
    /// Keys for the given snapshot generation.
    pub fn new(version: u32) -> Self {
        Self {
            namespace: "roster".to_string(),
            version: version.max(1),
        }
    }

    /// Current snapshot generation.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Entity snapshot key.
    pub fn entities(&self) -> String {
        self.versioned("entities", self.version)
    }

    /// Blessing snapshot key.
    pub fn blessings(&self) -> String {
        self.versioned("blessings", self.version)
    }

    /// Default filter key.
    pub fn default_filter(&self) -> String {
        format!("{}.default_filter", self.namespace)
    }

    /// Default sort key.
    pub fn default_sort(&self) -> String {
        format!("{}.default_sort", self.namespace)
    }

    /// Key for a small named setting.
    pub fn setting(&self, name: &str) -> String {
        format!("{}.setting.{name}", self.namespace)
    }

    /// Snapshot keys of every older generation.
    pub fn stale(&self) -> Vec<String> {
        (1..self.version)
            .flat_map(|version| {
                [
                    self.versioned("entities", version),
                    self.versioned("blessings", version),
                ]
            })
            .collect()
    }

    fn versioned(&self, name: &str, version: u32) -> String {
        format!("{}.{name}_v{version}", self.namespace)
    }
}

/// Entity list as persisted, with the time it was written.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// When the snapshot was saved.
    pub saved_at: DateTime<Utc>,
    /// Saved entities.
    pub entities: EntityList,
}

#[derive(Serialize)]
struct SnapshotOut<'a> {
    saved_at: DateTime<Utc>,
    entities: Vec<&'a Entity>,
}

#[derive(Deserialize)]
struct SnapshotIn {
    saved_at: DateTime<Utc>,
    entities: Vec<Entity>,
}

/// Typed access to the cache entries.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn PersistentCache>,
    keys: CacheKeys,
}

impl CacheStore {
    /// Wrap a backend using snapshot generation `version`.
    pub fn new(backend: Arc<dyn PersistentCache>, version: u32) -> Self {
        Self {
            backend,
            keys: CacheKeys::new(version),
        }
    }

    /// Key names in use.
    pub fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    /// Delete snapshots written by older generations. Returns how many existed.
    pub async fn purge_stale(&self) -> Result<usize> {
        let mut removed = 0;
        for key in self.keys.stale() {
            if self.backend.has(&key).await? {
                self.backend.delete(&key).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!("removed {removed} stale cache entries");
        }
        Ok(removed)
    }

    /// Last saved entity snapshot. Missing or corrupt entries yield `None`.
    pub async fn load_snapshot(&self) -> Option<Snapshot> {
        let stored: SnapshotIn = self.load(&self.keys.entities()).await?;
        Some(Snapshot {
            saved_at: stored.saved_at,
            entities: EntityList::from_entities(stored.entities),
        })
    }

    /// Persist the entity list.
    pub async fn save_snapshot(&self, entities: &EntityList) -> Result<()> {
        let payload = SnapshotOut {
            saved_at: Utc::now(),
            entities: entities.as_refs(),
        };
        self.store(&self.keys.entities(), &payload).await
    }

    /// Last saved blessings.
    pub async fn load_blessings(&self) -> Option<BlessingSet> {
        self.load(&self.keys.blessings()).await
    }

    /// Persist the blessings.
    pub async fn save_blessings(&self, blessings: &BlessingSet) -> Result<()> {
        self.store(&self.keys.blessings(), blessings).await
    }

    /// Restore the default filter, dropping children that no longer resolve.
    pub async fn load_default_filter(&self, manager: &FilterManager) -> RootFilter {
        match self.load::<Value>(&self.keys.default_filter()).await {
            Some(value) => manager.restore_root(&value),
            None => RootFilter::empty(),
        }
    }

    /// Persist `filter` as the default.
    pub async fn save_default_filter(&self, filter: &dyn Filter) -> Result<()> {
        self.store(&self.keys.default_filter(), &filter.config())
            .await
    }

    /// Forget the default filter.
    pub async fn clear_default_filter(&self) -> Result<()> {
        self.backend.delete(&self.keys.default_filter()).await
    }

    /// Persisted default sort, if any.
    pub async fn load_default_sort(&self) -> Option<SortConfig> {
        self.load(&self.keys.default_sort()).await
    }

    /// Persist the default sort.
    pub async fn save_default_sort(&self, config: &SortConfig) -> Result<()> {
        self.store(&self.keys.default_sort(), config).await
    }

    /// Read a named setting.
    pub async fn setting<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.load(&self.keys.setting(name)).await
    }

    /// Write a named setting.
    pub async fn put_setting<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        self.store(&self.keys.setting(name), value).await
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = match self.backend.get(key).await {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!("cache miss for {key}");
                return None;
            }
            Err(err) => {
                warn!("treating unreadable cache entry {key} as a miss: {err:#}");
                return None;
            }
        };
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                warn!("treating malformed cache entry {key} as a miss: {err}");
                None
            }
        }
    }

    async fn store<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .with_context(|| format!("failed to serialize cache entry {key}"))?;
        self.backend.put(key, &value).await
    }
}
