//! Discovery sources: install locations, start-menu shortcuts, volumes, built-ins

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use super::filters::AppFilter;
use crate::model::{bytes_to_kb, AppRecord, AppSource, EXE_EXTENSION};
use crate::platform;

/// Per-call discovery failures
#[derive(Error, Debug)]
pub enum DiscoveryError {
    // only shortcut resolution raises these
    #[cfg_attr(not(windows), allow(dead_code))]
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[cfg_attr(not(windows), allow(dead_code))]
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Facility unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DiscoveryError {
    /// Absent or denied entries are routine and skipped silently
    pub fn is_expected(&self) -> bool {
        matches!(self, DiscoveryError::AccessDenied(_) | DiscoveryError::NotFound(_))
    }
}

/// Lowercase, backslash-separated, no trailing separator
pub fn normalize_dir(path: &str) -> String {
    path.to_lowercase()
        .replace('/', "\\")
        .trim_end_matches('\\')
        .to_string()
}

/// Install directories taken from the uninstall registry for one discovery pass
#[derive(Debug, Clone, Default)]
pub struct InstalledLocationSet {
    dirs: HashSet<String>,
}

impl InstalledLocationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dir: &str) {
        let normalized = normalize_dir(dir);
        if !normalized.is_empty() {
            self.dirs.insert(normalized);
        }
    }

    /// True if `dir` equals a location or sits below one on a separator boundary
    pub fn contains_dir(&self, dir: &str) -> bool {
        let dir = normalize_dir(dir);
        if self.dirs.contains(&dir) {
            return true;
        }
        dir.match_indices('\\')
            .any(|(pos, _)| pos > 0 && self.dirs.contains(&dir[..pos]))
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for InstalledLocationSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for dir in iter {
            set.insert(dir.as_ref());
        }
        set
    }
}

/// A resolved `.lnk` file
#[derive(Debug, Clone)]
pub struct ShortcutTarget {
    /// Shortcut file stem
    pub link_name: String,
    pub target: PathBuf,
}

/// OS facilities the index builder draws from
pub trait DiscoveryHost: Send + Sync {
    fn installed_locations(&self) -> InstalledLocationSet;

    /// Fails as a whole only when the shell-link facility is missing
    fn shortcut_targets(&self) -> Result<Vec<ShortcutTarget>, DiscoveryError>;

    fn volumes(&self) -> Vec<PathBuf>;

    /// Catalog entries; existence is checked by the builder
    fn builtin_catalog(&self) -> Vec<AppRecord>;
}

/// The live machine
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl DiscoveryHost for SystemHost {
    fn installed_locations(&self) -> InstalledLocationSet {
        platform::uninstall_install_locations()
            .into_iter()
            .filter(|location| Path::new(location).is_dir())
            .collect()
    }

    fn shortcut_targets(&self) -> Result<Vec<ShortcutTarget>, DiscoveryError> {
        let resolver = platform::ShellLinkResolver::new()?;
        let mut targets = Vec::new();

        for dir in platform::start_menu_dirs() {
            for entry in WalkDir::new(&dir).into_iter().filter_map(|e| e.ok()) {
                let path = entry.path();
                let is_link = path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("lnk"))
                    .unwrap_or(false);
                if !entry.file_type().is_file() || !is_link {
                    continue;
                }

                match resolver.resolve(path) {
                    Ok(target) => targets.push(ShortcutTarget {
                        link_name: path
                            .file_stem()
                            .map(|s| s.to_string_lossy().to_string())
                            .unwrap_or_default(),
                        target,
                    }),
                    Err(e) if e.is_expected() => {}
                    Err(e) => debug!("Failed to resolve shortcut {:?}: {}", path, e),
                }
            }
        }

        Ok(targets)
    }

    fn volumes(&self) -> Vec<PathBuf> {
        platform::mounted_volumes()
            .into_iter()
            .filter(|volume| volume.exists())
            .collect()
    }

    fn builtin_catalog(&self) -> Vec<AppRecord> {
        builtin_catalog(&platform::system_root())
    }
}

/// Keep shortcut targets that are existing, plausibly-sized executables
pub fn collect_shortcut_apps(targets: &[ShortcutTarget], filter: &AppFilter) -> Vec<AppRecord> {
    targets
        .iter()
        .filter_map(|shortcut| {
            let target_str = shortcut.target.to_string_lossy();
            if !target_str.to_lowercase().ends_with(EXE_EXTENSION) || !shortcut.target.exists() {
                return None;
            }
            let size_kb = filter.accept(&shortcut.target)?;
            let exe = shortcut.target.file_name()?.to_string_lossy().to_string();

            Some(AppRecord::new(
                shortcut.link_name.to_lowercase(),
                exe,
                target_str.to_string(),
                size_kb,
                AppSource::StartMenu,
            ))
        })
        .collect()
}

/// Well-known OS utilities under the system root
pub fn builtin_catalog(system_root: &Path) -> Vec<AppRecord> {
    const CATALOG: &[(&str, &str)] = &[
        ("calc", r"System32\calc.exe"),
        ("notepad", r"System32\notepad.exe"),
        ("mspaint", r"System32\mspaint.exe"),
        ("taskmgr", r"System32\taskmgr.exe"),
        ("explorer", "explorer.exe"),
        ("cmd", r"System32\cmd.exe"),
        ("powershell", r"System32\WindowsPowerShell\v1.0\powershell.exe"),
        ("regedit", "regedit.exe"),
        ("msconfig", r"System32\msconfig.exe"),
        ("snippingtool", r"System32\SnippingTool.exe"),
        ("wordpad", r"System32\wordpad.exe"),
        ("control", r"System32\control.exe"),
    ];

    CATALOG
        .iter()
        .map(|(name, relative)| {
            let path = relative
                .split('\\')
                .fold(system_root.to_path_buf(), |acc, part| acc.join(part));
            let exe = relative.rsplit('\\').next().unwrap_or(relative);
            AppRecord::new(*name, exe, path.to_string_lossy(), 0, AppSource::Builtin)
        })
        .collect()
}

/// Catalog entries whose executable is present, with their measured size
pub fn present_builtins(catalog: Vec<AppRecord>) -> Vec<AppRecord> {
    catalog
        .into_iter()
        .filter_map(|mut app| {
            let meta = std::fs::metadata(&app.path).ok()?;
            app.size_kb = bytes_to_kb(meta.len());
            Some(app)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn location_match_is_separator_bounded() {
        let set: InstalledLocationSet =
            [r"C:\Program Files\VideoLAN\VLC\", r"D:\Games\Steam"].into_iter().collect();

        assert_eq!(set.len(), 2);
        assert!(set.contains_dir(r"c:\program files\videolan\vlc"));
        assert!(set.contains_dir(r"C:\Program Files\VideoLAN\VLC\plugins"));
        assert!(set.contains_dir("D:/Games/Steam/steamapps"));
        assert!(!set.contains_dir(r"C:\Program Files\VideoLAN\VLC2"));
        assert!(!set.contains_dir(r"C:\Program Files\VideoLAN"));
        assert!(!set.contains_dir(r"D:\Games"));
    }

    #[test]
    fn empty_locations_are_ignored() {
        let set: InstalledLocationSet = ["", "\\"].into_iter().collect();
        assert!(set.is_empty());
        assert!(!set.contains_dir(r"C:\anything"));
    }

    #[test]
    fn shortcuts_keep_only_sized_existing_executables() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("Editor.exe");
        File::create(&app).unwrap().set_len(200 * 1024).unwrap();
        let tiny = dir.path().join("tiny.exe");
        File::create(&tiny).unwrap().set_len(1024).unwrap();
        let doc = dir.path().join("readme.txt");
        File::create(&doc).unwrap().set_len(200 * 1024).unwrap();

        let targets = vec![
            ShortcutTarget { link_name: "My Editor".into(), target: app.clone() },
            ShortcutTarget { link_name: "Tiny".into(), target: tiny },
            ShortcutTarget { link_name: "Readme".into(), target: doc },
            ShortcutTarget { link_name: "Gone".into(), target: dir.path().join("gone.exe") },
        ];

        let apps = collect_shortcut_apps(&targets, &AppFilter::default());
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].name, "my editor");
        assert_eq!(apps[0].exe, "Editor.exe");
        assert_eq!(apps[0].size_kb, 200);
        assert_eq!(apps[0].source, AppSource::StartMenu);
    }

    #[test]
    fn builtins_are_kept_only_when_present() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("System32")).unwrap();
        std::fs::write(root.path().join("System32").join("notepad.exe"), vec![0u8; 2048]).unwrap();

        let catalog = builtin_catalog(root.path());
        assert_eq!(catalog.len(), 12);
        assert!(catalog.iter().all(AppRecord::is_builtin));

        let present = present_builtins(catalog);
        assert_eq!(present.len(), 1);
        assert_eq!(present[0].name, "notepad");
        assert_eq!(present[0].size_kb, 2);
    }
}
