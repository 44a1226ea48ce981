// Configuration file loading

use crate::logs::{DEFAULT_HISTORY_CAPACITY, DEFAULT_MAX_IDLE_POLLS, StreamConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/inspectron/config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    pub navigation_timeout_secs: u64,
    pub max_pages: Option<usize>,
    pub label_elements: bool,
    pub user_agent: String,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            navigation_timeout_secs: 40,
            max_pages: None,
            label_elements: false,
            user_agent: inspectron_scanner::http::DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CrawlSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub poll_interval_ms: u64,
    pub max_idle_polls: u32,
    pub history_capacity: usize,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            max_idle_polls: DEFAULT_MAX_IDLE_POLLS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl LogSettings {
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_idle_polls: self.max_idle_polls,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub request_timeout_secs: u64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
        }
    }
}

impl ScanSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawl: CrawlSettings,
    pub logs: LogSettings,
    pub scan: ScanSettings,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from(shellexpand::tilde(DEFAULT_CONFIG_PATH).as_ref())
    }

    /// Loads `path` when given. Without one, the default location is used if
    /// it exists and built-in defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
                Self::load(Path::new(&expanded))
            }
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    Self::load(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}
