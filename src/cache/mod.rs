//! Cache store and staleness policy
//!
//! The index is persisted as one JSON artifact next to a metadata artifact
//! holding the last build time. Both are rewritten wholesale through a
//! temp file and a rename.

mod dedup;

pub use dedup::deduplicate;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::Config;
use crate::model::AppRecord;

const CACHE_FILE_NAME: &str = "apps_cache.json";
const META_FILE_NAME: &str = "meta_cache.json";

/// Metadata artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub last_update: DateTime<Utc>,
}

/// On-disk index plus its freshness policy
#[derive(Debug, Clone)]
pub struct CacheStore {
    cache_path: PathBuf,
    meta_path: PathBuf,
    refresh_interval: Duration,
}

impl CacheStore {
    pub fn new(dir: impl AsRef<Path>, refresh_interval: Duration) -> Self {
        let dir = dir.as_ref();
        Self {
            cache_path: dir.join(CACHE_FILE_NAME),
            meta_path: dir.join(META_FILE_NAME),
            refresh_interval,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.cache_dir, config.refresh_interval())
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn exists(&self) -> bool {
        self.cache_path.exists()
    }

    /// Read the persisted index
    pub fn load(&self) -> Result<Vec<AppRecord>> {
        let content = fs::read_to_string(&self.cache_path)
            .with_context(|| format!("Failed to read cache file: {:?}", self.cache_path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse cache file: {:?}", self.cache_path))
    }

    /// Replace the persisted index
    pub fn save(&self, apps: &[AppRecord]) -> Result<()> {
        let content = serde_json::to_string_pretty(apps).context("Failed to serialize app index")?;
        write_atomic(&self.cache_path, content.as_bytes())?;
        debug!("Saved {} apps to {:?}", apps.len(), self.cache_path);
        Ok(())
    }

    /// Last build metadata; missing or unreadable metadata reads as none
    pub fn load_meta(&self) -> Option<CacheMeta> {
        let content = fs::read_to_string(&self.meta_path).ok()?;
        match serde_json::from_str(&content) {
            Ok(meta) => Some(meta),
            Err(e) => {
                debug!("Ignoring unreadable cache metadata {:?}: {}", self.meta_path, e);
                None
            }
        }
    }

    pub fn save_meta(&self, last_update: DateTime<Utc>) -> Result<()> {
        let content = serde_json::to_string_pretty(&CacheMeta { last_update })
            .context("Failed to serialize cache metadata")?;
        write_atomic(&self.meta_path, content.as_bytes())
    }

    pub fn is_outdated(&self) -> bool {
        self.is_outdated_at(Utc::now())
    }

    /// Outdated without metadata, or once the last build is older than the interval
    pub fn is_outdated_at(&self, now: DateTime<Utc>) -> bool {
        match self.load_meta() {
            Some(meta) => now - meta.last_update > self.refresh_interval,
            None => true,
        }
    }

    /// Human-readable time since the last build
    pub fn cache_age_at(&self, now: DateTime<Utc>) -> String {
        match self.load_meta() {
            Some(meta) => {
                let elapsed = (now - meta.last_update).num_minutes().max(0);
                format!("{}h {}m ago", elapsed / 60, elapsed % 60)
            }
            None => "never".to_string(),
        }
    }

    /// Drop dead entries, re-merge, and rewrite the cache artifact
    pub fn clean(&self, apps: &[AppRecord]) -> Result<(Vec<AppRecord>, usize)> {
        let (alive, removed) = clean_dead_entries(apps.to_vec());
        let cleaned = deduplicate(alive);
        self.save(&cleaned)?;
        info!("Cache cleaned: removed {} dead entries, {} apps remain", removed, cleaned.len());
        Ok((cleaned, removed))
    }

    /// Snapshot for display
    pub fn status(&self, apps: &[AppRecord], is_building: bool) -> CacheStatus {
        let now = Utc::now();
        CacheStatus {
            cache_path: self.cache_path.clone(),
            app_count: apps.len(),
            last_update: self.load_meta().map(|m| m.last_update),
            age: self.cache_age_at(now),
            outdated: self.is_outdated_at(now),
            size_kb: fs::metadata(&self.cache_path)
                .ok()
                .map(|m| m.len() as f64 / 1024.0),
            is_building,
        }
    }
}

/// Split off records whose executable is gone
pub fn clean_dead_entries(apps: Vec<AppRecord>) -> (Vec<AppRecord>, usize) {
    let total = apps.len();
    let alive: Vec<AppRecord> = apps.into_iter().filter(AppRecord::exists).collect();
    let removed = total - alive.len();
    (alive, removed)
}

/// Write to a uniquely named sibling temp file, then rename over the target
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("Cache path has no parent directory: {:?}", path))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create cache directory: {:?}", parent))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {:?}", parent))?;
    tmp.write_all(content)
        .and_then(|_| tmp.flush())
        .with_context(|| format!("Failed to write temp file for {:?}", path))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {:?}", path))?;
    Ok(())
}

/// What `cache status` reports
#[derive(Debug, Clone)]
pub struct CacheStatus {
    pub cache_path: PathBuf,
    pub app_count: usize,
    pub last_update: Option<DateTime<Utc>>,
    pub age: String,
    pub outdated: bool,
    pub size_kb: Option<f64>,
    pub is_building: bool,
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let last = self
            .last_update
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());

        writeln!(f, "=== Cache Status ===")?;
        writeln!(f, "File          : {}", self.cache_path.display())?;
        writeln!(f, "Apps stored   : {}", self.app_count)?;
        writeln!(f, "Last update   : {} ({})", last, self.age)?;
        write!(f, "Outdated      : {}", if self.outdated { "Yes" } else { "No" })?;
        if let Some(size_kb) = self.size_kb {
            write!(f, "\nCache size    : {:.1} KB", size_kb)?;
        }
        if self.is_building {
            write!(f, "\nRebuild       : in progress")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AppSource;

    fn store(dir: &Path) -> CacheStore {
        CacheStore::new(dir, Duration::hours(24))
    }

    fn record(name: &str, path: &Path) -> AppRecord {
        AppRecord::new(name, format!("{name}.exe"), path.to_string_lossy(), 120, AppSource::Disk)
    }

    #[test]
    fn staleness_follows_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let built = Utc::now();

        assert!(store.is_outdated_at(built));
        assert_eq!(store.cache_age_at(built), "never");

        store.save_meta(built).unwrap();
        assert!(!store.is_outdated_at(built));
        assert!(!store.is_outdated_at(built + Duration::hours(23)));
        assert!(store.is_outdated_at(built + Duration::hours(24) + Duration::seconds(1)));
        assert_eq!(store.cache_age_at(built + Duration::minutes(125)), "2h 5m ago");
    }

    #[test]
    fn garbage_metadata_counts_as_outdated() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(META_FILE_NAME), "not json").unwrap();
        assert!(store(dir.path()).is_outdated());
    }

    #[test]
    fn save_replaces_the_whole_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir.path().join("nested"));
        let a = record("a", &dir.path().join("a.exe"));
        let b = record("b", &dir.path().join("b.exe"));

        store.save(&[a.clone(), b.clone()]).unwrap();
        store.save(&[b.clone()]).unwrap();

        assert!(store.exists());
        assert_eq!(store.load().unwrap(), vec![b]);
        let leftovers = fs::read_dir(dir.path().join("nested")).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn concurrent_saves_never_publish_mixed_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let small: Vec<AppRecord> = (0..3)
            .map(|i| record(&format!("s{i}"), &dir.path().join(format!("s{i}.exe"))))
            .collect();
        let large: Vec<AppRecord> = (0..400)
            .map(|i| record(&format!("l{i}"), &dir.path().join(format!("l{i}.exe"))))
            .collect();

        std::thread::scope(|scope| {
            for apps in [&small, &large, &small, &large] {
                let store = &store;
                scope.spawn(move || {
                    for _ in 0..20 {
                        store.save(apps).unwrap();
                    }
                });
            }
        });

        let loaded = store.load().unwrap();
        assert!(loaded == small || loaded == large);
    }

    #[test]
    fn clean_removes_exactly_the_dead_entries() {
        let dir = tempfile::tempdir().unwrap();
        let alive_path = dir.path().join("alive.exe");
        fs::write(&alive_path, b"x").unwrap();

        let apps = vec![
            record("alive", &alive_path),
            record("dead", &dir.path().join("dead.exe")),
            record("ghost", &dir.path().join("ghost.exe")),
        ];

        let (alive, removed) = clean_dead_entries(apps.clone());
        assert_eq!(removed + alive.len(), apps.len());
        assert_eq!(removed, 2);
        assert_eq!(alive[0].name, "alive");

        let store = store(dir.path());
        let (cleaned, removed) = store.clean(&apps).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.load().unwrap(), cleaned);
    }

    #[test]
    fn status_reports_counts_and_freshness() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let apps = vec![record("a", &dir.path().join("a.exe"))];
        store.save(&apps).unwrap();
        store.save_meta(Utc::now()).unwrap();

        let status = store.status(&apps, false);
        assert_eq!(status.app_count, 1);
        assert!(!status.outdated);
        assert!(status.size_kb.is_some());
        assert!(status.to_string().contains("Apps stored   : 1"));
    }
}
