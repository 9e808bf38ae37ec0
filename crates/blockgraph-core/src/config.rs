//! Configuration loading and typed config structures for a graph world.
//!
//! The configuration lives in `blockgraph-config.yaml`. This module defines
//! strongly-typed structs that mirror the YAML structure and a loader that
//! reads and validates the file. Every field has a default, so an empty
//! document is a valid configuration.

use std::path::{Path, PathBuf};

use blockgraph_store::DEFAULT_MAX_IDLE_TICKS;
use blockgraph_types::SaveMode;
use serde::Deserialize;

/// Conventional file name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "blockgraph-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level graph world configuration.
///
/// Mirrors the structure of `blockgraph-config.yaml`. Unknown sections are
/// ignored so a host can keep its own settings in the same file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GraphConfig {
    /// Where and how often data is written.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Region eviction settings.
    #[serde(default)]
    pub unload: UnloadConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GraphConfig {
    /// Load and validate configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.incremental_save_factor == 0 {
            return Err(ConfigError::Invalid {
                field: "storage.incremental_save_factor",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.unload.max_idle_ticks == 0 {
            return Err(ConfigError::Invalid {
                field: "unload.max_idle_ticks",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.storage.root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "storage.root",
                reason: "must not be empty".to_owned(),
            });
        }
        Ok(())
    }

    /// A default configuration rooted at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageConfig {
                root: root.into(),
                ..StorageConfig::default()
            },
            ..Self::default()
        }
    }
}

/// Storage location and write-back policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one subdirectory per universe.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// When dirty graphs and regions are written.
    #[serde(default)]
    pub save_mode: SaveMode,

    /// In incremental mode, one in this many dirty items is written per
    /// tick (rounded up).
    #[serde(default = "default_incremental_save_factor")]
    pub incremental_save_factor: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            save_mode: SaveMode::default(),
            incremental_save_factor: default_incremental_save_factor(),
        }
    }
}

/// Region eviction settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UnloadConfig {
    /// Ticks a region may sit unused before it is evicted.
    #[serde(default = "default_max_idle_ticks")]
    pub max_idle_ticks: u64,
}

impl Default for UnloadConfig {
    fn default() -> Self {
        Self {
            max_idle_ticks: default_max_idle_ticks(),
        }
    }
}

/// Logging configuration, read by the host binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("graph-data")
}

const fn default_incremental_save_factor() -> usize {
    10
}

const fn default_max_idle_ticks() -> u64 {
    DEFAULT_MAX_IDLE_TICKS
}

fn default_log_level() -> String {
    "info".to_owned()
}
