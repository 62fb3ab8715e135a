use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Args;
use roster_core::{
    cache::{CacheStore, FileCache},
    config::AppConfig,
    filter::{Filter, FilterManager},
    models::{BlessingContext, Entity},
    query::{Query, QuickFilter},
    sort::{resolve, SortConfig, SortDirection},
    sync::{HttpUpstream, JsonNormalizer, PublishOrigin, SyncEvent, Synchronizer},
    Scheduler,
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Options for `roster list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Free-text search on name, full name or exact id.
    #[arg(long)]
    search: Option<String>,
    /// Sort id, e.g. `power`, `level`, `blessed_potential`.
    #[arg(long)]
    sort: Option<String>,
    /// Sort ascending instead of descending.
    #[arg(long)]
    asc: bool,
    /// Only show entities matching an active blessing.
    #[arg(long)]
    quick: bool,
    /// Store `--sort`/`--asc` as the default sort.
    #[arg(long)]
    save_default: bool,
    /// Refresh from upstream before listing.
    #[arg(long)]
    refresh: bool,
}

/// Wired collaborators shared by every command.
pub struct App {
    sync: Synchronizer,
}

impl App {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let cache = CacheStore::new(
            Arc::new(FileCache::new(&config.cache_root)),
            config.cache_version,
        );
        let upstream = HttpUpstream::new(&config.upstream_url, config.request_timeout())?;
        let scheduler = Scheduler::new(config.request_delay(), config.request_timeout());
        let sync = Synchronizer::new(
            scheduler,
            Arc::new(upstream),
            Arc::new(JsonNormalizer),
            cache,
        );
        Ok(Self { sync })
    }

    fn cache(&self) -> &CacheStore {
        self.sync.cache()
    }

    pub async fn sync(&self, watch: bool, interval: Option<Duration>) -> Result<()> {
        let events = self.sync.subscribe();
        let printer = tokio::spawn(print_events(events));

        match self.sync.bootstrap().await {
            Ok(report) => println!(
                "{} entities ({} unavailable sources)",
                report.entities,
                report.failed.len()
            ),
            Err(err) if watch => warn!("initial refresh failed: {err}"),
            Err(err) => return Err(err).context("refresh failed"),
        }

        if watch {
            let Some(interval) = interval else {
                anyhow::bail!("--watch needs poll_interval_secs greater than zero");
            };
            info!("refreshing every {interval:?}, press Ctrl-C to stop");
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = self.sync.refresh().await {
                            warn!("refresh failed: {err}");
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }

        printer.abort();
        Ok(())
    }

    pub async fn list(&self, args: ListArgs) -> Result<()> {
        if args.refresh {
            if let Err(err) = self.sync.bootstrap().await {
                warn!("refresh failed, listing cached data: {err}");
            }
        }
        let entities = match self.cache().load_snapshot().await {
            Some(snapshot) if !args.refresh => snapshot.entities,
            _ => self.sync.entities(),
        };
        let blessings = self.cache().load_blessings().await.unwrap_or_default();
        let context = BlessingContext::new(blessings, chrono::Utc::now());

        let sort = match &args.sort {
            Some(id) => {
                let direction = if args.asc {
                    SortDirection::Asc
                } else {
                    SortDirection::Desc
                };
                SortConfig::new(id.clone(), direction)
            }
            None => self.cache().load_default_sort().await.unwrap_or_default(),
        };
        let sorter = resolve(&sort, &context);
        if args.save_default {
            self.cache().save_default_sort(&sorter.config()).await?;
            info!("saved default sort {}", sorter.id());
        }

        let manager = FilterManager::with_builtins(context.clone());
        let filter = self.cache().load_default_filter(&manager).await;
        let mut query = Query::new(sorter).with_filter(Arc::new(filter));
        if args.quick {
            query = query.with_quick_filters(QuickFilter::from_context(&context));
        }
        if let Some(search) = args.search {
            query = query.with_search(search);
        }

        let rows = query.run(&entities);
        for entity in &rows {
            println!("{}", describe(entity, &context));
        }
        println!(
            "{} of {} shown · {} · {}",
            rows.len(),
            entities.len(),
            query.sorter().label(),
            query.filter().label()
        );
        Ok(())
    }

    pub async fn set_filter(&self, json: &str) -> Result<()> {
        let value: serde_json::Value =
            serde_json::from_str(json).context("filter is not valid JSON")?;
        let manager = FilterManager::with_builtins(BlessingContext::empty());
        let root = manager.restore_root(&value);
        if root.is_empty() {
            warn!("filter resolved to no conditions");
        }
        self.cache().save_default_filter(&root).await?;
        println!("default filter: {}", root.label());
        Ok(())
    }

    pub async fn show_filter(&self) -> Result<()> {
        let manager = FilterManager::with_builtins(BlessingContext::empty());
        let root = self.cache().load_default_filter(&manager).await;
        println!("{}", root.label());
        println!("{}", serde_json::to_string_pretty(&root.config())?);
        Ok(())
    }

    pub async fn clear_filter(&self) -> Result<()> {
        self.cache().clear_default_filter().await?;
        println!("default filter cleared");
        Ok(())
    }
}

fn describe(entity: &Entity, context: &BlessingContext) -> String {
    let marker = if context.is_blessed(entity) { "*" } else { " " };
    let owned = if entity.own { " " } else { "-" };
    format!(
        "{owned}{marker} {:>8}  {:<28} {:<9} lvl {:>3}  grade {}/{}  power {:>10.1}",
        entity.id,
        entity.display_name(),
        entity.rarity.as_str(),
        entity.level,
        entity.stars,
        entity.max_stars,
        entity.power
    )
}

async fn print_events(mut events: mpsc::UnboundedReceiver<SyncEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SyncEvent::Published { entities, origin } => {
                let source = match origin {
                    PublishOrigin::Cache => "cache",
                    PublishOrigin::Refresh => "upstream",
                    PublishOrigin::Update => "update",
                };
                info!("{} entities from {source}", entities.len());
            }
            SyncEvent::Error(message) => error!("refresh failed: {message}"),
            SyncEvent::Phase(_) => {}
        }
    }
}
