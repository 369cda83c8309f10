//! Volume scanner for registry-scoped executable discovery

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::filters::AppFilter;
use super::sources::{normalize_dir, InstalledLocationSet};
use crate::model::{AppRecord, AppSource, EXE_EXTENSION};

/// Directory fragments the walk never descends into
#[derive(Debug, Clone, Default)]
pub struct SkipList {
    fragments: Vec<String>,
}

impl SkipList {
    pub fn new<S: AsRef<str>>(fragments: &[S]) -> Self {
        Self {
            fragments: fragments
                .iter()
                .map(|f| normalize_dir(f.as_ref()))
                .filter(|f| !f.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, dir: &Path) -> bool {
        let normalized = normalize_dir(&dir.to_string_lossy());
        self.fragments.iter().any(|f| normalized.contains(f.as_str()))
    }
}

/// Everything one volume task needs, shared read-only across tasks
#[derive(Debug)]
pub struct ScanContext {
    pub locations: InstalledLocationSet,
    pub filter: AppFilter,
    pub skip: SkipList,
}

/// Scan every volume concurrently, one blocking task per volume
pub async fn scan_volumes(volumes: Vec<PathBuf>, ctx: Arc<ScanContext>, silent: bool) -> Vec<AppRecord> {
    info!("Scanning {} volumes", volumes.len());

    let found: Arc<Mutex<Vec<AppRecord>>> = Arc::new(Mutex::new(Vec::new()));
    let mut tasks = JoinSet::new();

    for volume in volumes {
        let ctx = ctx.clone();
        let found = found.clone();
        tasks.spawn_blocking(move || {
            let apps = scan_volume(&volume, &ctx);
            let count = apps.len();
            found
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend(apps);
            (volume, count)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((volume, count)) => {
                debug!("Volume {:?}: {} apps", volume, count);
                if !silent {
                    println!("  {} -> {} apps", volume.display(), count);
                }
            }
            Err(e) => warn!("Volume scan task failed: {}", e),
        }
    }

    let mut guard = found.lock().unwrap_or_else(PoisonError::into_inner);
    std::mem::take(&mut *guard)
}

/// Walk one volume, collecting executables inside installed locations
pub fn scan_volume(volume: &Path, ctx: &ScanContext) -> Vec<AppRecord> {
    let mut results = Vec::new();

    let walker = WalkDir::new(volume)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !should_skip_entry(e, &ctx.skip));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Error walking directory: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if !file_name.to_lowercase().ends_with(EXE_EXTENSION) {
            continue;
        }

        let in_location = entry
            .path()
            .parent()
            .map(|dir| ctx.locations.contains_dir(&dir.to_string_lossy()))
            .unwrap_or(false);
        if !in_location {
            continue;
        }

        let Some(size_kb) = ctx.filter.accept(entry.path()) else {
            continue;
        };

        let name = entry
            .path()
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        results.push(AppRecord::new(
            name,
            file_name.to_string(),
            entry.path().to_string_lossy().to_string(),
            size_kb,
            AppSource::Disk,
        ));
    }

    results
}

/// Prune denylisted directories and hidden directories below the root
fn should_skip_entry(entry: &walkdir::DirEntry, skip: &SkipList) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }

    if skip.matches(entry.path()) {
        return true;
    }

    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};

    fn sized(path: &Path, bytes: u64) {
        File::create(path).unwrap().set_len(bytes).unwrap();
    }

    fn context(locations: &[&Path], skip: &[&str]) -> ScanContext {
        ScanContext {
            locations: locations.iter().map(|p| p.to_string_lossy().to_string()).collect(),
            filter: AppFilter::default(),
            skip: SkipList::new(skip),
        }
    }

    #[test]
    fn skip_list_matches_fragments_case_insensitively() {
        let skip = SkipList::new(&["system32", r"appdata\local\temp"]);
        assert!(skip.matches(Path::new(r"C:\Windows\System32\drivers")));
        assert!(skip.matches(Path::new("C:/Users/me/AppData/Local/Temp/x")));
        assert!(!skip.matches(Path::new(r"C:\Program Files\App")));
    }

    #[test]
    fn only_installed_locations_are_collected() {
        let volume = tempfile::tempdir().unwrap();
        let installed = volume.path().join("Acme");
        let nested = installed.join("bin");
        let stray = volume.path().join("Downloads");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir_all(&stray).unwrap();

        sized(&installed.join("Acme.exe"), 300 * 1024);
        sized(&nested.join("acme-cli.exe"), 100 * 1024);
        sized(&installed.join("acme_updater.exe"), 300 * 1024);
        sized(&stray.join("random.exe"), 300 * 1024);

        let ctx = context(&[installed.as_path()], &[]);
        let mut apps = scan_volume(volume.path(), &ctx);
        apps.sort_by(|a, b| a.name.cmp(&b.name));

        let names: Vec<&str> = apps.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["acme", "acme-cli"]);
        assert!(apps.iter().all(|a| a.source == AppSource::Disk));
        assert_eq!(apps[0].exe, "Acme.exe");
    }

    #[test]
    fn denylisted_and_hidden_subtrees_are_pruned() {
        let volume = tempfile::tempdir().unwrap();
        let installed = volume.path().join("Suite");
        let cache = installed.join("cache");
        let hidden = installed.join(".git");
        fs::create_dir_all(&cache).unwrap();
        fs::create_dir_all(&hidden).unwrap();

        sized(&installed.join("suite.exe"), 100 * 1024);
        sized(&cache.join("cached.exe"), 100 * 1024);
        sized(&hidden.join("hidden.exe"), 100 * 1024);

        let ctx = context(&[installed.as_path()], &["cache"]);
        let apps = scan_volume(volume.path(), &ctx);
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].name, "suite");
    }

    #[tokio::test]
    async fn volumes_are_scanned_concurrently_and_merged() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        sized(&first.path().join("one.exe"), 100 * 1024);
        sized(&second.path().join("two.exe"), 100 * 1024);

        let ctx = Arc::new(context(&[first.path(), second.path()], &[]));
        let volumes = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let mut apps = scan_volumes(volumes, ctx, true).await;
        apps.sort_by(|a, b| a.name.cmp(&b.name));

        let names: Vec<&str> = apps.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["one", "two"]);
    }
}
