//! Configuration module for the file monitor.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`.filemonitor/settings.toml`)
//! - Environment variable overrides
//! - CLI argument overrides (applied by the binary)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `FILEMONITOR_` and use double
//! underscores to separate nested levels:
//! - `FILEMONITOR_MONITOR__BACKEND=polling` sets `monitor.backend`
//! - `FILEMONITOR_MONITOR__POLL_INTERVAL_MS=250` sets `monitor.poll_interval_ms`
//! - `FILEMONITOR_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::monitor::{BackendKind, DEFAULT_POLL_INTERVAL_MS, DEFAULT_QUEUE_CAPACITY};

/// Directory holding the settings file, searched for from the working
/// directory upwards.
pub const CONFIG_DIR: &str = ".filemonitor";
pub const CONFIG_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "FILEMONITOR_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Monitor engine settings
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Event source: "native" or "polling"
    #[serde(default)]
    pub backend: BackendKind,

    /// Rescan interval of the polling backend
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Pending events kept before the oldest are dropped
    #[serde(default = "default_max_pending_events")]
    pub max_pending_events: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Level for everything not listed in `modules`
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `filemonitor = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
fn default_max_pending_events() -> usize {
    DEFAULT_QUEUE_CAPACITY
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            monitor: MonitorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            poll_interval_ms: default_poll_interval_ms(),
            max_pending_events: default_max_pending_events(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources, searching for the settings
    /// file from the current directory upwards.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let start = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::load_in(&start)
    }

    /// Like [`Settings::load`], but search from `start` instead of the
    /// current directory.
    pub fn load_in(start: &Path) -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config(start)
            .unwrap_or_else(|| start.join(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honouring defaults
    /// and environment overrides. A missing file is not an error.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nesting levels; single underscores
            // stay inside field names
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the nearest `.filemonitor/settings.toml` at or above `start`.
    fn find_workspace_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join(CONFIG_FILE))
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Write a default settings file under `dir`.
    pub fn init_config_file(
        dir: impl AsRef<Path>,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = dir.as_ref().join(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}
