//! Background rebuilds and the periodic staleness check

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use super::{Indexer, SharedIndex};

/// Rebuild on a separate task and swap the result into `shared`
pub fn background_rebuild(indexer: &Indexer, shared: &SharedIndex) -> JoinHandle<()> {
    let indexer = indexer.clone();
    let shared = shared.clone();

    tokio::spawn(async move {
        info!("Background index update started");
        match indexer.rebuild_into(&shared, true).await {
            Ok(count) => info!("Background index update done: {} apps", count),
            Err(e) => error!("Background index update failed: {:#}", e),
        }
    })
}

/// Periodically rebuild once the cache goes stale.
///
/// Sleeps the configured interval between checks and exits at the first
/// check after `Indexer::request_stop`.
pub fn spawn_auto_update(indexer: &Indexer, shared: &SharedIndex) -> JoinHandle<()> {
    let interval = indexer.config().check_interval();
    auto_update_every(indexer, shared, interval)
}

fn auto_update_every(indexer: &Indexer, shared: &SharedIndex, interval: Duration) -> JoinHandle<()> {
    let indexer = indexer.clone();
    let shared = shared.clone();

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            if indexer.should_stop() {
                info!("Auto-update stopping by request");
                break;
            }

            if !indexer.store().is_outdated() {
                continue;
            }

            info!("Cache is outdated, reindexing");
            match indexer.rebuild_into(&shared, true).await {
                Ok(count) => info!("Auto-update done: {} apps", count),
                Err(e) => error!("Auto-update failed: {:#}", e),
            }
        }
    })
}
