//! App indexing module
//!
//! Runs discovery, merges the results, persists them, and publishes the
//! finished index.

pub mod filters;
mod scheduler;
mod scanner;
pub mod sources;

pub use scheduler::{background_rebuild, spawn_auto_update};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::cache::{clean_dead_entries, deduplicate, CacheStore};
use crate::config::Config;
use crate::model::AppRecord;
use filters::AppFilter;
use scanner::{ScanContext, SkipList};
use sources::{collect_shortcut_apps, present_builtins, DiscoveryHost, SystemHost};

/// A complete, merged index
pub type Index = Arc<Vec<AppRecord>>;

/// The published index shared by the console and background tasks.
///
/// Writers only ever swap in a whole new `Index`.
#[derive(Clone, Default)]
pub struct SharedIndex {
    inner: Arc<RwLock<Index>>,
}

impl SharedIndex {
    pub fn new(apps: Vec<AppRecord>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(apps))),
        }
    }

    /// Current index
    pub fn snapshot(&self) -> Index {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publish a fully built replacement
    pub fn replace(&self, apps: Vec<AppRecord>) {
        let next = Arc::new(apps);
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

/// Indexer runtime state
pub struct IndexerState {
    pub is_building: AtomicBool,
    pub should_stop: AtomicBool,
    /// Serializes builds
    build_lock: tokio::sync::Mutex<()>,
}

/// Shared indexer handle
#[derive(Clone)]
pub struct Indexer {
    config: Arc<Config>,
    store: CacheStore,
    host: Arc<dyn DiscoveryHost>,
    state: Arc<IndexerState>,
}

impl Indexer {
    /// Create an indexer over the live system
    pub fn new(config: Config) -> Self {
        Self::with_host(config, Arc::new(SystemHost))
    }

    pub fn with_host(config: Config, host: Arc<dyn DiscoveryHost>) -> Self {
        let store = CacheStore::from_config(&config);
        Self {
            config: Arc::new(config),
            store,
            host,
            state: Arc::new(IndexerState {
                is_building: AtomicBool::new(false),
                should_stop: AtomicBool::new(false),
                build_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Check if a build is running
    pub fn is_building(&self) -> bool {
        self.state.is_building.load(Ordering::Relaxed)
    }

    /// Request background tasks to stop at their next check
    pub fn request_stop(&self) {
        self.state.should_stop.store(true, Ordering::Relaxed);
    }

    fn should_stop(&self) -> bool {
        self.state.should_stop.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Load the cached index when fresh, otherwise rebuild it from discovery.
    pub async fn build(&self, force: bool, silent: bool) -> Result<Vec<AppRecord>> {
        let _guard = self.state.build_lock.lock().await;
        self.build_locked(force, silent).await
    }

    /// Caller holds `build_lock`
    async fn build_locked(&self, force: bool, silent: bool) -> Result<Vec<AppRecord>> {
        if !force && self.store.exists() && !self.store.is_outdated() {
            match self.store.load() {
                Ok(apps) => {
                    if !silent {
                        println!(
                            "Loaded {} apps from cache (updated {})",
                            apps.len(),
                            self.store.cache_age_at(Utc::now())
                        );
                    }
                    info!("Loaded {} apps from cache", apps.len());
                    return Ok(apps);
                }
                Err(e) => warn!("Cache unreadable, rebuilding: {:#}", e),
            }
        }

        if !silent {
            let reason = if force { "forced" } else { "cache outdated" };
            println!("Building app index ({})...", reason);
        }

        self.state.is_building.store(true, Ordering::Relaxed);
        let result = self.discover_and_persist(silent).await;
        self.state.is_building.store(false, Ordering::Relaxed);
        result
    }

    async fn discover_and_persist(&self, silent: bool) -> Result<Vec<AppRecord>> {
        let filter = AppFilter::new(&self.config.filters);

        let host = self.host.clone();
        let shortcut_filter = filter.clone();
        let (locations, shortcut_apps) = tokio::task::spawn_blocking(move || {
            let locations = host.installed_locations();
            let shortcut_apps = match host.shortcut_targets() {
                Ok(targets) => collect_shortcut_apps(&targets, &shortcut_filter),
                Err(e) => {
                    warn!("Start-menu shortcuts unavailable: {}", e);
                    Vec::new()
                }
            };
            (locations, shortcut_apps)
        })
        .await
        .context("Registry and shortcut discovery task failed")?;

        info!(
            "Found {} install locations and {} shortcut apps",
            locations.len(),
            shortcut_apps.len()
        );

        let ctx = Arc::new(ScanContext {
            locations,
            filter,
            skip: SkipList::new(self.config.filters.skip_dirs.as_slice()),
        });
        let disk_apps = scanner::scan_volumes(self.host.volumes(), ctx, silent).await;

        let builtins = present_builtins(self.host.builtin_catalog());
        if !silent {
            println!("Added {} built-in apps", builtins.len());
        }

        let mut discovered = shortcut_apps;
        discovered.extend(disk_apps);
        let (mut merged, removed_dead) = clean_dead_entries(discovered);
        merged.extend(builtins);
        let index = deduplicate(merged);

        self.store.save(&index)?;
        self.store.save_meta(Utc::now())?;

        info!("Index built: {} apps, removed {} dead entries", index.len(), removed_dead);
        if !silent {
            println!();
            println!("Index built: {} apps  |  removed {} dead entries", index.len(), removed_dead);
            println!("Cache saved -> {}", self.store.cache_path().display());
        }

        Ok(index)
    }

    /// Full forced rebuild published into `shared`.
    ///
    /// The lock is held until the new index is published, so a concurrent
    /// clean never overwrites it with an older snapshot.
    pub async fn rebuild_into(&self, shared: &SharedIndex, silent: bool) -> Result<usize> {
        let _guard = self.state.build_lock.lock().await;
        let apps = self.build_locked(true, silent).await?;
        let count = apps.len();
        shared.replace(apps);
        Ok(count)
    }

    /// Drop dead entries from the published index, save and republish it.
    ///
    /// Returns `(removed, remaining)`.
    pub async fn clean(&self, shared: &SharedIndex) -> Result<(usize, usize)> {
        let _guard = self.state.build_lock.lock().await;
        let current = shared.snapshot();
        let (cleaned, removed) = self.store.clean(&current)?;
        let remaining = cleaned.len();
        shared.replace(cleaned);
        Ok((removed, remaining))
    }
}
