//! Keeps the local roster in step with the upstream API.
//!
//! The [`Synchronizer`] owns the entity list. It paints from the cache on
//! start, refreshes from the three upstream sources through the shared
//! [`Scheduler`], reconciles the result against what it already holds and
//! persists it. Subscribers receive every published list as a
//! [`SyncEvent`]; nothing outside the synchroniser mutates the list.

mod normalize;
mod reconcile;
mod store;
mod upstream;

use std::{future::Future, sync::Arc};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    cache::CacheStore,
    models::{BlessingContext, BlessingSet, Entity, EntityList},
    scheduler::{Scheduler, SchedulerError},
};

pub use normalize::{JsonNormalizer, Normalized, Normalizer, RawSources};
pub use reconcile::reconcile;
pub use store::EntityStore;
pub use upstream::{Action, DataSource, HttpUpstream, Upstream, UpstreamError};

/// Refresh cycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No refresh running.
    Idle,
    /// Waiting on upstream fetches.
    Loading,
    /// Normalising, reconciling and persisting.
    Reconciling,
}

/// Why a list was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOrigin {
    /// Restored from the persistent cache.
    Cache,
    /// Produced by a refresh.
    Refresh,
    /// A single entity was replaced.
    Update,
}

/// Notifications delivered to subscribers.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// The refresh cycle moved to a new phase.
    Phase(SyncPhase),
    /// A new entity list is current.
    Published {
        /// The list now held.
        entities: EntityList,
        /// What produced it.
        origin: PublishOrigin,
    },
    /// A refresh failed as a whole.
    Error(String),
}

/// Errors surfaced by refreshes and actions.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another refresh has not finished yet.
    #[error("a refresh is already in progress")]
    RefreshInProgress,
    /// No data source could be fetched.
    #[error("all data sources failed: {0}")]
    AllSourcesFailed(String),
    /// The fetched data could not be turned into entities.
    #[error("failed to normalise fetched data")]
    Normalize(#[source] anyhow::Error),
    /// A scheduled upstream call failed.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Outcome of a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    /// Entities held after the refresh.
    pub entities: usize,
    /// Whether a new list was published.
    pub changed: bool,
    /// Sources that failed and were served from earlier data.
    pub failed: Vec<DataSource>,
}

struct Inner {
    scheduler: Scheduler,
    upstream: Arc<dyn Upstream>,
    normalizer: Arc<dyn Normalizer>,
    cache: CacheStore,
    store: RwLock<EntityStore>,
    raw: Mutex<RawSources>,
    phase: Mutex<SyncPhase>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<SyncEvent>>>,
}

impl Inner {
    fn emit(&self, event: SyncEvent) {
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    /// Callers hold the store write guard so publishes follow install order.
    fn publish(&self, entities: EntityList, origin: PublishOrigin) {
        debug!(count = entities.len(), ?origin, "publishing entities");
        self.emit(SyncEvent::Published { entities, origin });
    }

    fn set_phase(&self, phase: SyncPhase) {
        *self.phase.lock() = phase;
        self.emit(SyncEvent::Phase(phase));
    }
}

/// Holds the refresh phase for its lifetime and returns it to idle on drop.
struct PhaseGuard<'a> {
    inner: &'a Inner,
}

impl<'a> PhaseGuard<'a> {
    fn enter(inner: &'a Inner) -> Result<Self, SyncError> {
        {
            let mut phase = inner.phase.lock();
            if *phase != SyncPhase::Idle {
                return Err(SyncError::RefreshInProgress);
            }
            *phase = SyncPhase::Loading;
        }
        inner.emit(SyncEvent::Phase(SyncPhase::Loading));
        Ok(Self { inner })
    }

    fn advance(&self, phase: SyncPhase) {
        self.inner.set_phase(phase);
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.inner.set_phase(SyncPhase::Idle);
    }
}

/// Single owner of the synchronised entity list.
///
/// Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct Synchronizer {
    inner: Arc<Inner>,
}

impl Synchronizer {
    /// Wire a synchroniser from its collaborators.
    pub fn new(
        scheduler: Scheduler,
        upstream: Arc<dyn Upstream>,
        normalizer: Arc<dyn Normalizer>,
        cache: CacheStore,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                scheduler,
                upstream,
                normalizer,
                cache,
                store: RwLock::new(EntityStore::new()),
                raw: Mutex::new(RawSources::default()),
                phase: Mutex::new(SyncPhase::Idle),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Receive every event from now on. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SyncEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inner.subscribers.lock().push(sender);
        receiver
    }

    /// Current entity list.
    pub fn entities(&self) -> EntityList {
        self.inner.store.read().entities()
    }

    /// Current blessings.
    pub fn blessings(&self) -> BlessingSet {
        self.inner.store.read().blessings().clone()
    }

    /// Blessing context for the present instant.
    pub fn context(&self) -> BlessingContext {
        self.inner.store.read().context(Utc::now())
    }

    /// Current refresh phase.
    pub fn phase(&self) -> SyncPhase {
        *self.inner.phase.lock()
    }

    /// The persistent cache this synchroniser writes to.
    pub fn cache(&self) -> &CacheStore {
        &self.inner.cache
    }

    /// The scheduler all upstream calls go through.
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Drop stale cache generations, paint from the cache, then refresh.
    ///
    /// A cached snapshot is published before any fetch starts, but only
    /// while nothing is held yet. The refresh always runs; its result is
    /// returned.
    pub async fn bootstrap(&self) -> Result<RefreshReport, SyncError> {
        let cache = &self.inner.cache;
        if let Err(err) = cache.purge_stale().await {
            warn!("failed to purge stale cache entries: {err:#}");
        }

        if !self.inner.store.read().entities().is_empty() {
            debug!("entities already held, skipping the cache paint");
            return self.refresh().await;
        }

        if let Some(blessings) = cache.load_blessings().await {
            self.inner.store.write().set_blessings(blessings);
        }

        if let Some(snapshot) = cache.load_snapshot().await {
            info!(
                "restored {} entities cached at {}",
                snapshot.entities.len(),
                snapshot.saved_at
            );
            let entities = snapshot.entities;
            let mut store = self.inner.store.write();
            if store.entities().is_empty() && store.set_entities(entities.clone()) {
                self.inner.publish(entities, PublishOrigin::Cache);
            }
        }

        self.refresh().await
    }

    /// Fetch every source, normalise, reconcile and persist.
    ///
    /// A failing source is served from its last known payload. Only when all
    /// three fail does the refresh fail, and then nothing held changes.
    pub async fn refresh(&self) -> Result<RefreshReport, SyncError> {
        let guard = PhaseGuard::enter(&self.inner)?;

        let (entities, quests, blessings) = tokio::join!(
            self.fetch(DataSource::Entities),
            self.fetch(DataSource::Quests),
            self.fetch(DataSource::Blessings),
        );

        let previous = self.inner.raw.lock().clone();
        let mut raw = previous.clone();
        let mut failed = Vec::new();
        let mut reasons = Vec::new();
        let results = [entities, quests, blessings];
        for (source, result) in DataSource::ALL.into_iter().zip(results) {
            match result {
                Ok(value) => *raw.slot_mut(source) = Some(value),
                Err(err) => {
                    warn!("fetching {source} failed, keeping previous data: {err:#}");
                    reasons.push(format!("{source}: {err}"));
                    failed.push(source);
                }
            }
        }

        if failed.len() == DataSource::ALL.len() {
            let reason = reasons.join("; ");
            self.inner.emit(SyncEvent::Error(reason.clone()));
            return Err(SyncError::AllSourcesFailed(reason));
        }

        guard.advance(SyncPhase::Reconciling);
        let mut normalized = self.normalize(&raw)?;
        if !normalized.rejected.is_empty() {
            for &source in &normalized.rejected {
                warn!("{source} payload rejected, keeping previous data");
                *raw.slot_mut(source) = previous.get(source).cloned();
                if !failed.contains(&source) {
                    failed.push(source);
                }
            }
            normalized = self.normalize(&raw)?;
        }
        *self.inner.raw.lock() = raw;

        if let Some(blessings) = normalized.blessings {
            if let Err(err) = self.inner.cache.save_blessings(&blessings).await {
                warn!("failed to persist blessings: {err:#}");
            }
            self.inner.store.write().set_blessings(blessings);
        }

        let mut changed = false;
        if let Some(fresh) = normalized.entities {
            let entities = {
                let mut store = self.inner.store.write();
                let merged = reconcile(&store.entities(), fresh);
                changed = store.set_entities(merged.clone());
                if changed {
                    self.inner.publish(merged.clone(), PublishOrigin::Refresh);
                }
                merged
            };
            if !changed {
                debug!("refresh produced no visible change");
            }
            if let Err(err) = self.inner.cache.save_snapshot(&entities).await {
                warn!("failed to persist entity snapshot: {err:#}");
            }
        } else {
            debug!("no entity data yet, keeping the current list");
        }

        failed.sort_by_key(|source| DataSource::ALL.iter().position(|s| s == source));
        let report = RefreshReport {
            entities: self.entities().len(),
            changed,
            failed,
        };
        info!(
            entities = report.entities,
            changed = report.changed,
            "refresh finished"
        );
        Ok(report)
    }

    /// Replace the entity with the same id and publish the new list.
    ///
    /// Returns `false` when the id is unknown.
    pub fn update_entity(&self, entity: impl Into<Arc<Entity>>) -> bool {
        let entity = entity.into();
        let id = entity.id.clone();
        let mut store = self.inner.store.write();
        match store.replace(entity) {
            Some(entities) => {
                self.inner.publish(entities, PublishOrigin::Update);
                true
            }
            None => {
                warn!("ignoring update for unknown entity {id}");
                false
            }
        }
    }

    /// Run an action through the scheduler.
    pub async fn mutate(&self, action: Action) -> Result<Value, SyncError> {
        let upstream = Arc::clone(&self.inner.upstream);
        let name = action.name.clone();
        let result = self
            .inner
            .scheduler
            .schedule(move || async move { upstream.mutate(&action).await })
            .await;
        if let Err(err) = &result {
            warn!("action {name} failed: {err:#}");
        }
        Ok(result?)
    }

    /// Run an action and, once it succeeds, apply `apply` to the current
    /// version of entity `id` and publish the result.
    ///
    /// Returns the updated entity, or `None` when `id` is unknown by the
    /// time the action completes.
    pub async fn mutate_and_update<F>(
        &self,
        action: Action,
        id: &str,
        apply: F,
    ) -> Result<Option<Arc<Entity>>, SyncError>
    where
        F: FnOnce(&Entity, &Value) -> Entity,
    {
        let response = self.mutate(action).await?;
        let Some(current) = self.inner.store.read().get(id) else {
            warn!("entity {id} vanished before its action completed");
            return Ok(None);
        };
        let updated = Arc::new(apply(&current, &response));
        self.update_entity(Arc::clone(&updated));
        Ok(Some(updated))
    }

    fn normalize(&self, raw: &RawSources) -> Result<Normalized, SyncError> {
        self.inner.normalizer.normalize(raw).map_err(|err| {
            self.inner.emit(SyncEvent::Error(format!("{err:#}")));
            SyncError::Normalize(err)
        })
    }

    fn fetch(
        &self,
        source: DataSource,
    ) -> impl Future<Output = Result<Value, SchedulerError>> + Send {
        let upstream = Arc::clone(&self.inner.upstream);
        self.inner
            .scheduler
            .schedule(move || async move { upstream.fetch(source).await })
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::{
        cache::{MemoryCache, PersistentCache},
        models::fixtures::entity,
    };

    #[derive(Default)]
    struct FakeUpstream {
        responses: Mutex<HashMap<DataSource, Value>>,
        calls: Mutex<Vec<DataSource>>,
        actions: Mutex<Vec<Action>>,
        gate: Option<Arc<Semaphore>>,
    }

    impl FakeUpstream {
        fn serve(&self, source: DataSource, value: Value) {
            self.responses.lock().insert(source, value);
        }

        fn fail(&self, source: DataSource) {
            self.responses.lock().remove(&source);
        }
    }

    #[async_trait]
    impl Upstream for FakeUpstream {
        async fn fetch(&self, source: DataSource) -> Result<Value> {
            if let Some(gate) = &self.gate {
                gate.acquire().await?.forget();
            }
            self.calls.lock().push(source);
            self.responses
                .lock()
                .get(&source)
                .cloned()
                .ok_or_else(|| anyhow!("{source} unavailable"))
        }

        async fn mutate(&self, action: &Action) -> Result<Value> {
            self.actions.lock().push(action.clone());
            if action.name == "broken" {
                return Err(UpstreamError::RateLimited.into());
            }
            Ok(json!({"ok": true}))
        }
    }

    fn raw_entity(id: &str, level: u32) -> Value {
        let mut girl = entity(id);
        girl.level = level;
        serde_json::to_value(girl).expect("serializable")
    }

    fn harness(upstream: Arc<FakeUpstream>) -> (Synchronizer, Arc<MemoryCache>) {
        let backend = Arc::new(MemoryCache::new());
        let cache = CacheStore::new(backend.clone(), 2);
        let sync = Synchronizer::new(
            Scheduler::new(Duration::ZERO, None),
            upstream,
            Arc::new(JsonNormalizer),
            cache,
        );
        (sync, backend)
    }

    fn drain(receiver: &mut mpsc::UnboundedReceiver<SyncEvent>) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn bootstrap_reconciles_cached_snapshot() -> Result<()> {
        let upstream = Arc::new(FakeUpstream::default());
        upstream.serve(
            DataSource::Entities,
            json!([raw_entity("a", 1), raw_entity("c", 5), raw_entity("d", 9)]),
        );
        upstream.serve(DataSource::Quests, json!({}));
        upstream.serve(DataSource::Blessings, json!([]));
        let (sync, _) = harness(upstream.clone());

        let mut a = entity("a");
        a.full_name = "Cached only".to_string();
        let cached = EntityList::from_entities(vec![a, entity("b")]);
        sync.cache().save_snapshot(&cached).await?;

        let mut events = sync.subscribe();
        let report = sync.bootstrap().await?;
        assert_eq!(report.entities, 3);
        assert!(report.changed);
        assert!(report.failed.is_empty());

        let events = drain(&mut events);
        let painted = events
            .iter()
            .find_map(|event| match event {
                SyncEvent::Published {
                    entities,
                    origin: PublishOrigin::Cache,
                } => Some(entities.clone()),
                _ => None,
            })
            .expect("cache paint");
        let cached_a = painted.get("a").expect("cached a");

        let current = sync.entities();
        assert_eq!(current.len(), 3);
        assert!(Arc::ptr_eq(current.get("a").expect("a"), cached_a));
        assert!(current.get("b").is_none());
        assert_eq!(*upstream.calls.lock(), DataSource::ALL.to_vec());

        let restored = sync.cache().load_snapshot().await.expect("persisted");
        assert_eq!(restored.entities.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn bootstrap_deletes_stale_generations() -> Result<()> {
        let upstream = Arc::new(FakeUpstream::default());
        upstream.serve(DataSource::Entities, json!([raw_entity("a", 1)]));
        let (sync, backend) = harness(upstream);
        backend.put("roster.entities_v1", &json!({"old": true})).await?;

        sync.bootstrap().await?;
        assert!(!backend.has("roster.entities_v1").await?);
        assert!(backend.has("roster.entities_v2").await?);
        Ok(())
    }

    #[tokio::test]
    async fn partial_failure_keeps_previous_source_data() -> Result<()> {
        let upstream = Arc::new(FakeUpstream::default());
        upstream.serve(DataSource::Entities, json!([raw_entity("a", 1)]));
        upstream.serve(
            DataSource::Quests,
            json!({"a": {"step": "2", "completed": false}}),
        );
        let (sync, _) = harness(upstream.clone());

        let first = sync.refresh().await?;
        assert_eq!(first.failed, vec![DataSource::Blessings]);

        upstream.fail(DataSource::Quests);
        upstream.serve(DataSource::Entities, json!([raw_entity("a", 2)]));
        let second = sync.refresh().await?;
        assert_eq!(second.failed, vec![DataSource::Quests, DataSource::Blessings]);

        let a = sync.entities().get("a").cloned().expect("a");
        assert_eq!(a.level, 2);
        assert_eq!(a.quest.as_ref().and_then(|q| q.step.as_deref()), Some("2"));
        Ok(())
    }

    #[tokio::test]
    async fn malformed_secondary_payload_keeps_previous_data() -> Result<()> {
        let upstream = Arc::new(FakeUpstream::default());
        upstream.serve(DataSource::Entities, json!([raw_entity("a", 1)]));
        upstream.serve(
            DataSource::Quests,
            json!({"a": {"step": "2", "completed": false}}),
        );
        upstream.serve(DataSource::Blessings, json!([]));
        let (sync, _) = harness(upstream.clone());
        sync.refresh().await?;

        upstream.serve(DataSource::Entities, json!([raw_entity("a", 9)]));
        upstream.serve(DataSource::Quests, json!({"a": "garbage"}));
        upstream.serve(DataSource::Blessings, json!([{"bogus": 1}]));
        let report = sync.refresh().await?;
        assert!(report.changed);
        assert_eq!(report.failed, vec![DataSource::Quests, DataSource::Blessings]);

        let a = sync.entities().get("a").cloned().expect("a");
        assert_eq!(a.level, 9);
        assert_eq!(a.quest.as_ref().and_then(|q| q.step.as_deref()), Some("2"));
        assert_eq!(sync.blessings(), BlessingSet::default());

        upstream.serve(DataSource::Entities, json!([raw_entity("a", 10)]));
        sync.refresh().await?;
        assert_eq!(sync.entities().get("a").map(|girl| girl.level), Some(10));
        Ok(())
    }

    #[tokio::test]
    async fn total_failure_leaves_state_untouched() -> Result<()> {
        let upstream = Arc::new(FakeUpstream::default());
        upstream.serve(DataSource::Entities, json!([raw_entity("a", 1)]));
        let (sync, _) = harness(upstream.clone());
        sync.refresh().await?;
        let before = sync.entities();

        upstream.fail(DataSource::Entities);
        let mut events = sync.subscribe();
        let err = sync.refresh().await.expect_err("every source down");
        assert!(matches!(err, SyncError::AllSourcesFailed(_)));
        assert!(sync.entities().ptr_eq(&before));
        assert_eq!(sync.phase(), SyncPhase::Idle);

        let events = drain(&mut events);
        assert!(events.iter().any(|event| matches!(event, SyncEvent::Error(_))));
        assert!(!events
            .iter()
            .any(|event| matches!(event, SyncEvent::Published { .. })));

        upstream.serve(DataSource::Entities, json!([raw_entity("a", 3)]));
        assert!(sync.refresh().await?.changed);
        Ok(())
    }

    #[tokio::test]
    async fn unchanged_refresh_publishes_nothing() -> Result<()> {
        let upstream = Arc::new(FakeUpstream::default());
        upstream.serve(
            DataSource::Entities,
            json!([raw_entity("a", 1), raw_entity("b", 1)]),
        );
        let (sync, _) = harness(upstream);
        sync.refresh().await?;
        let before = sync.entities();

        let mut events = sync.subscribe();
        let report = sync.refresh().await?;
        assert!(!report.changed);
        assert!(sync.entities().ptr_eq(&before));
        assert!(!drain(&mut events)
            .iter()
            .any(|event| matches!(event, SyncEvent::Published { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_refresh_is_rejected() -> Result<()> {
        let gate = Arc::new(Semaphore::new(0));
        let upstream = Arc::new(FakeUpstream {
            gate: Some(gate.clone()),
            ..FakeUpstream::default()
        });
        upstream.serve(DataSource::Entities, json!([raw_entity("a", 1)]));
        let (sync, _) = harness(upstream);

        let running = tokio::spawn({
            let sync = sync.clone();
            async move { sync.refresh().await }
        });
        while sync.phase() == SyncPhase::Idle {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            sync.refresh().await,
            Err(SyncError::RefreshInProgress)
        ));

        gate.add_permits(DataSource::ALL.len());
        let report = running.await??;
        assert_eq!(report.entities, 1);
        assert_eq!(sync.phase(), SyncPhase::Idle);
        Ok(())
    }

    #[tokio::test]
    async fn update_entity_splices_and_publishes() -> Result<()> {
        let upstream = Arc::new(FakeUpstream::default());
        upstream.serve(
            DataSource::Entities,
            json!([raw_entity("a", 1), raw_entity("b", 1)]),
        );
        let (sync, _) = harness(upstream);
        sync.refresh().await?;
        let before = sync.entities();

        let mut events = sync.subscribe();
        let mut b = before.get("b").expect("b").as_ref().clone();
        b.level = 7;
        assert!(sync.update_entity(b));
        assert!(!sync.update_entity(entity("zz")));

        let after = sync.entities();
        assert!(Arc::ptr_eq(&after[0], &before[0]));
        assert_eq!(after.get("b").map(|girl| girl.level), Some(7));
        let published: Vec<_> = drain(&mut events)
            .into_iter()
            .filter_map(|event| match event {
                SyncEvent::Published { origin, .. } => Some(origin),
                _ => None,
            })
            .collect();
        assert_eq!(published, vec![PublishOrigin::Update]);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn publishes_follow_install_order() -> Result<()> {
        let upstream = Arc::new(FakeUpstream::default());
        upstream.serve(
            DataSource::Entities,
            json!([raw_entity("a", 1), raw_entity("b", 1)]),
        );
        let (sync, _) = harness(upstream);
        sync.refresh().await?;

        let mut events = sync.subscribe();
        let writers: Vec<_> = ["a", "b", "a", "b"]
            .into_iter()
            .enumerate()
            .map(|(worker, id)| {
                let sync = sync.clone();
                tokio::task::spawn_blocking(move || {
                    for step in 0..200 {
                        let mut girl = entity(id);
                        girl.level = (worker * 1000 + step) as u32;
                        sync.update_entity(girl);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.await?;
        }

        let last = drain(&mut events)
            .into_iter()
            .filter_map(|event| match event {
                SyncEvent::Published { entities, .. } => Some(entities),
                _ => None,
            })
            .last()
            .expect("published");
        assert!(last.ptr_eq(&sync.entities()));
        Ok(())
    }

    #[tokio::test]
    async fn bootstrap_skips_cache_paint_once_populated() -> Result<()> {
        let upstream = Arc::new(FakeUpstream::default());
        upstream.serve(DataSource::Entities, json!([raw_entity("a", 1)]));
        let (sync, _) = harness(upstream);
        sync.bootstrap().await?;

        let mut events = sync.subscribe();
        sync.bootstrap().await?;
        assert!(!drain(&mut events).iter().any(|event| matches!(
            event,
            SyncEvent::Published {
                origin: PublishOrigin::Cache,
                ..
            }
        )));
        Ok(())
    }

    #[tokio::test]
    async fn mutate_and_update_applies_response() -> Result<()> {
        let upstream = Arc::new(FakeUpstream::default());
        upstream.serve(DataSource::Entities, json!([raw_entity("a", 1)]));
        let (sync, _) = harness(upstream.clone());
        sync.refresh().await?;

        let action = Action::new("change_pose").for_entity("a");
        let updated = sync
            .mutate_and_update(action, "a", |current, response| {
                let mut next = current.clone();
                if response["ok"] == json!(true) {
                    next.pose = 5;
                }
                next
            })
            .await?
            .expect("known entity");
        assert_eq!(updated.pose, 5);
        assert_eq!(sync.entities().get("a").map(|girl| girl.pose), Some(5));

        let err = sync
            .mutate(Action::new("broken"))
            .await
            .expect_err("rate limited");
        match err {
            SyncError::Scheduler(SchedulerError::Task(inner)) => {
                assert!(inner.downcast_ref::<UpstreamError>().is_some());
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(upstream.actions.lock().len(), 2);
        Ok(())
    }
}
