//! Name and size heuristics applied to shortcut and disk results

use std::path::Path;

use crate::config::FilterConfig;
use crate::model::{bytes_to_kb, strip_exe};

/// Rejects installers, helpers and files outside the plausible app size range
#[derive(Debug, Clone)]
pub struct AppFilter {
    min_size_kb: f64,
    max_size_mb: f64,
    ignore_keywords: Vec<String>,
}

impl AppFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            min_size_kb: config.min_app_size_kb as f64,
            max_size_mb: config.max_app_size_mb as f64,
            ignore_keywords: config
                .ignore_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
        }
    }

    /// True if the stripped name contains none of the ignore keywords
    pub fn accepts_name(&self, file_name: &str) -> bool {
        let name = strip_exe(file_name);
        !self.ignore_keywords.iter().any(|k| name.contains(k.as_str()))
    }

    pub fn size_within_limits(&self, size_bytes: u64) -> bool {
        let size_kb = size_bytes as f64 / 1024.0;
        let size_mb = size_kb / 1024.0;
        self.min_size_kb <= size_kb && size_mb <= self.max_size_mb
    }

    /// Size in KB if the file passes the size check. Unreadable files fail.
    pub fn accepted_size_kb(&self, path: &Path) -> Option<u64> {
        let size = std::fs::metadata(path).ok()?.len();
        self.size_within_limits(size).then(|| bytes_to_kb(size))
    }

    /// Both checks; returns the size in KB of an accepted file
    pub fn accept(&self, path: &Path) -> Option<u64> {
        let file_name = path.file_name()?.to_string_lossy();
        if !self.accepts_name(&file_name) {
            return None;
        }
        self.accepted_size_kb(path)
    }
}

impl Default for AppFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}
