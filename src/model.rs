//! Shared types for the app index

use serde::{Deserialize, Serialize};
use std::path::Path;

/// File extension of launchable executables
pub const EXE_EXTENSION: &str = ".exe";

/// Where a record was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppSource {
    /// Start-menu shortcut target
    #[serde(rename = "startmenu")]
    StartMenu,
    /// Drive scan scoped to registry install locations
    #[serde(alias = "registry-scoped-disk")]
    Disk,
    /// Well-known OS utility
    Builtin,
}

impl std::fmt::Display for AppSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppSource::StartMenu => write!(f, "startmenu"),
            AppSource::Disk => write!(f, "disk"),
            AppSource::Builtin => write!(f, "builtin"),
        }
    }
}

/// Discovered executable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRecord {
    /// Extension-stripped, lowercased identifier
    pub name: String,
    /// Executable file name
    pub exe: String,
    /// Absolute path
    pub path: String,
    pub size_kb: u64,
    pub source: AppSource,
}

impl AppRecord {
    pub fn new(
        name: impl Into<String>,
        exe: impl Into<String>,
        path: impl Into<String>,
        size_kb: u64,
        source: AppSource,
    ) -> Self {
        Self {
            name: name.into(),
            exe: exe.into(),
            path: path.into(),
            size_kb,
            source,
        }
    }

    pub fn is_builtin(&self) -> bool {
        self.source == AppSource::Builtin
    }

    /// Whether the executable is still on disk
    pub fn exists(&self) -> bool {
        Path::new(&self.path).exists()
    }
}

/// Lowercase a name and drop the executable extension wherever it appears.
pub fn strip_exe(name: &str) -> String {
    name.trim().to_lowercase().replace(EXE_EXTENSION, "")
}

/// Bytes to whole kilobytes, rounded to nearest
pub fn bytes_to_kb(bytes: u64) -> u64 {
    (bytes as f64 / 1024.0).round() as u64
}
