//! Configuration management for the app indexer
//!
//! Handles loading, saving, and defaulting the TOML configuration.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub filters: FilterConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub service: ServiceConfig,

    /// Path to config file (not serialized)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory holding the cache artifacts (not serialized)
    #[serde(skip)]
    pub cache_dir: PathBuf,
}

/// Cache location and staleness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Overrides the default data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    /// Cache is outdated once older than this
    #[serde(default = "default_refresh_interval_hours")]
    pub refresh_interval_hours: u64,
}

/// Name and size heuristics for discovered executables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_min_app_size_kb")]
    pub min_app_size_kb: u64,

    #[serde(default = "default_max_app_size_mb")]
    pub max_app_size_mb: u64,

    /// Substrings marking installers, updaters and background helpers
    #[serde(default = "default_ignore_keywords")]
    pub ignore_keywords: Vec<String>,

    /// Path fragments whose subtrees the drive scan never enters
    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,
}

/// Background auto-update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
}

/// Close ladder timings and browser handling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_close_wait_secs")]
    pub close_wait_secs: u64,

    #[serde(default = "default_close_wait_secs")]
    pub shortcut_wait_secs: u64,

    #[serde(default = "default_terminate_wait_secs")]
    pub terminate_wait_secs: u64,

    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,

    /// Renderer count above which closing a browser needs confirmation
    #[serde(default = "default_browser_tab_threshold")]
    pub browser_tab_threshold: usize,
}

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions
fn default_refresh_interval_hours() -> u64 {
    24
}

fn default_min_app_size_kb() -> u64 {
    50
}

fn default_max_app_size_mb() -> u64 {
    500
}

fn default_check_interval_secs() -> u64 {
    3600
}

fn default_close_wait_secs() -> u64 {
    2
}

fn default_terminate_wait_secs() -> u64 {
    3
}

fn default_browser_tab_threshold() -> usize {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_browsers() -> Vec<String> {
    ["chrome", "firefox", "msedge", "opera", "brave", "vivaldi", "yandex"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_ignore_keywords() -> Vec<String> {
    [
        // Installers and updaters
        "setup", "install", "uninstall", "uninst", "update", "updater",
        "patch", "redist", "vcredist", "directx", "dxsetup", "dotnet",
        // Maintenance tools
        "crash", "report", "helper", "register", "activate", "repair",
        "cleanup", "remover", "migration", "wizard", "bootstrap",
        // Background agents
        "notification", "tray", "daemon", "service", "agent", "hook",
        "injector", "proxy", "handler", "monitor", "watcher", "scheduler",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_skip_dirs() -> Vec<String> {
    [
        "windows", "system32", "syswow64", "winsxs", "servicing",
        "assembly", "microsoft.net", "windowsapps", "temp", "tmp",
        "$recycle.bin",
        r"appdata\local\temp",
        r"appdata\local\microsoft\windows",
        r"appdata\roaming\microsoft",
        r"commonfiles\microsoft",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            refresh_interval_hours: default_refresh_interval_hours(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_app_size_kb: default_min_app_size_kb(),
            max_app_size_mb: default_max_app_size_mb(),
            ignore_keywords: default_ignore_keywords(),
            skip_dirs: default_skip_dirs(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            close_wait_secs: default_close_wait_secs(),
            shortcut_wait_secs: default_close_wait_secs(),
            terminate_wait_secs: default_terminate_wait_secs(),
            browsers: default_browsers(),
            browser_tab_threshold: default_browser_tab_threshold(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let (config_path, cache_dir) = Self::get_default_paths();
        Self {
            cache: CacheConfig::default(),
            filters: FilterConfig::default(),
            scheduler: SchedulerConfig::default(),
            control: ControlConfig::default(),
            service: ServiceConfig::default(),
            config_path,
            cache_dir,
        }
    }
}

impl Config {
    /// Get default paths for config file and cache directory
    fn get_default_paths() -> (PathBuf, PathBuf) {
        if let Some(proj_dirs) = ProjectDirs::from("com", "app-indexer", "app-indexer") {
            (
                proj_dirs.config_dir().join("config.toml"),
                proj_dirs.data_dir().join("cache"),
            )
        } else {
            // Fallback paths
            #[cfg(windows)]
            {
                let appdata = std::env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
                let base = PathBuf::from(appdata).join("AppIndexer");
                (base.join("config.toml"), base.join("cache"))
            }

            #[cfg(not(windows))]
            {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                (
                    PathBuf::from(&home).join(".config/app-indexer/config.toml"),
                    PathBuf::from(&home).join(".local/share/app-indexer/cache"),
                )
            }
        }
    }

    /// Load configuration from file, or create default if not exists
    pub fn load() -> Result<Self> {
        let (config_path, default_cache_dir) = Self::get_default_paths();

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?
        } else {
            info!("Config file not found, creating default at {:?}", config_path);
            let config = Config::default();
            config.save()?;
            config
        };

        config.config_path = config_path;
        config.cache_dir = match &config.cache.dir {
            Some(dir) => PathBuf::from(dir),
            None => default_cache_dir,
        };

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // Ensure parent directory exists
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        fs::write(&self.config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", self.config_path))?;

        info!("Configuration saved to {:?}", self.config_path);
        Ok(())
    }

    /// Staleness threshold for the cache
    pub fn refresh_interval(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cache.refresh_interval_hours as i64)
    }

    /// Sleep between auto-update checks
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.check_interval_secs)
    }

    /// Config rooted at an explicit cache directory
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }
}
