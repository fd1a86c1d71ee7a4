//! Configuration loading and validation
//!
//! The configuration file maps watched directories to their conversion
//! settings. JSON is the native format; a `.toml` extension selects TOML with
//! the same shape.

use crate::client::ZamzarConfig;
use crate::error::ConfigError;
use crate::monitor::DebouncerConfig;
use crate::orchestrator::Timing;
use crate::session::SessionSettings;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "hotfolders_config.json";
pub const API_KEY_ENV: &str = "HOTFOLDERS_API_KEY";

/// Contents of the configuration file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HotfoldersConfig {
    #[serde(default)]
    pub api_key: Option<ApiKey>,
    #[serde(default)]
    pub conversions: BTreeMap<String, ConversionEntry>,
    #[serde(default)]
    pub service: ZamzarConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    /// Upper bound on the number of paths the ignore registry will hold
    #[serde(default)]
    pub ignore_capacity: Option<usize>,
}

/// The API key as a single string or a list whose first element is used
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ApiKey {
    Single(String),
    List(Vec<String>),
}

impl ApiKey {
    fn first(&self) -> Option<&str> {
        let key = match self {
            Self::Single(key) => Some(key.as_str()),
            Self::List(keys) => keys.first().map(String::as_str),
        };
        key.filter(|key| !key.trim().is_empty())
    }
}

/// One watched directory as written in the configuration file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversionEntry {
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub from: Vec<String>,
    #[serde(default)]
    pub options: EntryOptions,
    #[serde(default)]
    pub ignore: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryOptions {
    #[serde(default)]
    pub autoextractzip: Toggle,
    #[serde(default)]
    pub subdirsearch: Toggle,
}

/// An on/off option written either as `0`/`1` or as a boolean
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Toggle {
    Flag(bool),
    Number(i64),
}

impl Default for Toggle {
    fn default() -> Self {
        Self::Flag(false)
    }
}

impl Toggle {
    pub fn is_on(self) -> bool {
        match self {
            Self::Flag(flag) => flag,
            Self::Number(n) => n == 1,
        }
    }
}

/// Timing knobs, all optional
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub settle_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub poll_timeout_secs: Option<u64>,
    /// Consecutive failed status polls tolerated before a format is given up
    pub max_poll_errors: u32,
    pub debounce_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 3000,
            poll_interval_ms: 1000,
            poll_timeout_secs: None,
            max_poll_errors: Timing::default().max_poll_errors,
            debounce_ms: DebouncerConfig::default().delay_ms,
        }
    }
}

impl HotfoldersConfig {
    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let is_toml = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let config = if is_toml {
            Self::from_toml(&content).map_err(|message| ConfigError::parse(path, message))?
        } else {
            Self::from_json(&content).map_err(|message| ConfigError::parse(path, message))?
        };

        debug!("Loaded {} watch entries from {}", config.conversions.len(), path.display());
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, String> {
        serde_json::from_str(content).map_err(|e| e.to_string())
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// The API key from the file, or from the environment when the file has none
    pub fn api_key(&self) -> Result<String, ConfigError> {
        self.api_key_or(std::env::var(API_KEY_ENV).ok())
    }

    fn api_key_or(&self, fallback: Option<String>) -> Result<String, ConfigError> {
        self.api_key
            .as_ref()
            .and_then(ApiKey::first)
            .map(str::to_string)
            .or_else(|| fallback.filter(|key| !key.trim().is_empty()))
            .ok_or(ConfigError::MissingApiKey { env: API_KEY_ENV })
    }

    /// Validated watch configurations, in directory order.
    ///
    /// Directory existence is checked when sessions start, not here.
    pub fn watches(&self) -> Result<Vec<WatchConfig>, ConfigError> {
        self.conversions
            .iter()
            .map(|(path, entry)| entry.to_watch(PathBuf::from(path)))
            .collect()
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            timing: Timing {
                settle_delay: Duration::from_millis(self.timing.settle_delay_ms),
                poll_interval: Duration::from_millis(self.timing.poll_interval_ms),
                poll_timeout: self.timing.poll_timeout_secs.map(Duration::from_secs),
                max_poll_errors: self.timing.max_poll_errors,
            },
            debounce: DebouncerConfig {
                delay_ms: self.timing.debounce_ms,
                ..Default::default()
            },
            ignore_capacity: self.ignore_capacity,
        }
    }
}

impl ConversionEntry {
    fn to_watch(&self, path: PathBuf) -> Result<WatchConfig, ConfigError> {
        if self.to.is_empty() {
            return Err(ConfigError::invalid_entry(path, "`to` lists no target formats"));
        }
        if self.from.is_empty() {
            return Err(ConfigError::invalid_entry(path, "`from` lists no source formats"));
        }
        let blank = |format: &String| format.trim().is_empty();
        if self.to.iter().any(blank) || self.from.iter().any(blank) {
            return Err(ConfigError::invalid_entry(path, "formats must not be empty strings"));
        }

        // Events carry absolute paths, so a relative key is anchored at the working directory
        let path = match std::path::absolute(&path) {
            Ok(absolute) => absolute,
            Err(e) => return Err(ConfigError::invalid_entry(path, e.to_string())),
        };

        Ok(WatchConfig {
            path,
            source_formats: self.from.iter().cloned().collect(),
            target_formats: self.to.clone(),
            options: WatchOptions {
                auto_extract_archive: self.options.autoextractzip.is_on(),
                recursive_scan: self.options.subdirsearch.is_on(),
            },
            ignore_patterns: self.ignore.iter().cloned().collect(),
        })
    }
}

/// Settings for one watched directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    pub path: PathBuf,
    /// Path suffixes that qualify a file, e.g. `.docx`
    pub source_formats: BTreeSet<String>,
    /// Formats requested from the service, in order
    pub target_formats: Vec<String>,
    pub options: WatchOptions,
    /// File names never converted, in the watched directory or any subdirectory
    pub ignore_patterns: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    pub auto_extract_archive: bool,
    pub recursive_scan: bool,
}

impl WatchConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            source_formats: BTreeSet::new(),
            target_formats: Vec::new(),
            options: WatchOptions::default(),
            ignore_patterns: BTreeSet::new(),
        }
    }

    pub fn from_format(mut self, format: impl Into<String>) -> Self {
        self.source_formats.insert(format.into());
        self
    }

    pub fn to_format(mut self, format: impl Into<String>) -> Self {
        self.target_formats.push(format.into());
        self
    }

    pub fn ignoring(mut self, name: impl Into<String>) -> Self {
        self.ignore_patterns.insert(name.into());
        self
    }

    pub fn auto_extract(mut self, enabled: bool) -> Self {
        self.options.auto_extract_archive = enabled;
        self
    }

    pub fn recursive(mut self, enabled: bool) -> Self {
        self.options.recursive_scan = enabled;
        self
    }

    /// Whether a file at `path` falls inside this watch
    pub fn covers(&self, path: &Path) -> bool {
        match path.parent() {
            Some(parent) if self.options.recursive_scan => parent.starts_with(&self.path),
            Some(parent) => parent == self.path,
            None => false,
        }
    }
}

/// The most specific watch covering `path`
pub fn watch_for<'a>(watches: &'a [WatchConfig], path: &Path) -> Option<&'a WatchConfig> {
    watches
        .iter()
        .filter(|watch| watch.covers(path))
        .max_by_key(|watch| watch.path.components().count())
}
