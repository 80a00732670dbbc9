//! Tracker configuration.
//!
//! Read from a TOML file (`~/.config/code-tracker/config.toml` by default):
//!
//! ```toml
//! debug = false
//! idle_threshold_ms = 15000
//! workspace_name = "code-tracker"
//!
//! [sink]
//! spreadsheet_id = "11PMsjz9HTO1"
//! worksheet_title = "Extension"
//! # root = "/home/me/.local/share/code-tracker/sheets"
//! ```
//!
//! A missing file yields defaults. An unreadable or malformed file is
//! reported as a [`ConfigError`]; callers fall back to defaults with
//! flushing disabled, so local accumulation is never blocked by config.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tracker_core::DEFAULT_IDLE_THRESHOLD_MS;

use crate::sink::{Destination, SinkTarget, WorksheetSink};

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The `[sink]` table is present but unusable.
    #[error("invalid sink configuration: {reason}")]
    InvalidSink { reason: String },
}

/// Supplies the tracker configuration.
pub trait ConfigProvider {
    fn load(&self) -> Result<TrackerConfig, ConfigError>;
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Enables debug-level logging
    pub debug: bool,

    /// Quiet period before a synthetic timeout; also the flush window
    pub idle_threshold_ms: u64,

    /// Overrides the workspace name derived from the working directory
    pub workspace_name: Option<String>,

    /// Overrides the generated session id
    pub session_id: Option<String>,

    /// Remote worksheet; flushing is disabled when absent
    pub sink: Option<SinkConfig>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            debug: false,
            idle_threshold_ms: DEFAULT_IDLE_THRESHOLD_MS,
            workspace_name: None,
            session_id: None,
            sink: None,
        }
    }
}

/// `[sink]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    pub spreadsheet_id: String,
    pub worksheet_title: String,
    /// Directory holding the spreadsheets; defaults to the user data dir
    #[serde(default)]
    pub root: Option<PathBuf>,
}

impl SinkConfig {
    /// Checks the table and resolves the storage root.
    pub fn validate(&self) -> Result<(PathBuf, Destination), ConfigError> {
        if self.spreadsheet_id.trim().is_empty() {
            return Err(ConfigError::InvalidSink {
                reason: "spreadsheet_id is empty".to_string(),
            });
        }
        if self.worksheet_title.trim().is_empty() {
            return Err(ConfigError::InvalidSink {
                reason: "worksheet_title is empty".to_string(),
            });
        }

        let root = match &self.root {
            Some(root) => root.clone(),
            None => dirs::data_dir()
                .map(|d| d.join("code-tracker").join("sheets"))
                .ok_or_else(|| ConfigError::InvalidSink {
                    reason: "no root given and no user data directory".to_string(),
                })?,
        };

        Ok((
            root,
            Destination::new(self.spreadsheet_id.clone(), self.worksheet_title.clone()),
        ))
    }
}

impl TrackerConfig {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("code-tracker").join("config.toml"))
    }

    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path`, returning defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content, path),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Idle threshold as a duration. Zero is bumped to one millisecond.
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_millis(self.idle_threshold_ms.max(1))
    }

    /// Builds the worksheet sink target, if one is configured.
    pub fn sink_target(&self) -> Result<Option<SinkTarget>, ConfigError> {
        let Some(sink) = &self.sink else {
            return Ok(None);
        };
        let (root, destination) = sink.validate()?;
        Ok(Some(SinkTarget::new(
            Arc::new(WorksheetSink::new(root)),
            destination,
        )))
    }
}

/// Provider reading a TOML file.
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    path: PathBuf,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for FileConfigProvider {
    fn load(&self) -> Result<TrackerConfig, ConfigError> {
        TrackerConfig::load(&self.path)
    }
}

/// Loads configuration, falling back to defaults on error.
///
/// The error is returned alongside so the caller can log it once logging
/// is set up.
pub fn load_or_default(provider: &dyn ConfigProvider) -> (TrackerConfig, Option<ConfigError>) {
    match provider.load() {
        Ok(config) => (config, None),
        Err(e) => (TrackerConfig::default(), Some(e)),
    }
}
