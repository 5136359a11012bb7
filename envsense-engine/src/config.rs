//! envsense-engine configuration
//!
//! Loaded from `config.toml` (see [`envsense_common::config`] for lookup
//! rules). Every key is optional; missing keys take the defaults below.

use std::path::{Path, PathBuf};

use envsense_common::config::{self as common_config, LoggingConfig, DATA_DIR_ENV};
use envsense_common::events::LogStream;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Minimum spacing between persisted entries, per log stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogIntervals {
    pub automatic: u64,
    pub manual: u64,
    pub combined: u64,
}

impl Default for LogIntervals {
    fn default() -> Self {
        Self {
            automatic: 10_000,
            manual: 10_000,
            combined: 10_000,
        }
    }
}

impl LogIntervals {
    pub fn for_stream(&self, stream: LogStream) -> u64 {
        match stream {
            LogStream::Automatic => self.automatic,
            LogStream::Manual => self.manual,
            LogStream::Combined => self.combined,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Data folder for log files and the settings file
    pub data_dir: Option<PathBuf>,

    /// Sustained disagreement required before a LongMismatch alert (strictly greater than)
    pub mismatch_threshold_ms: u64,

    /// Sampler tick cadence
    pub sample_interval_ms: u64,

    /// Audio classification loop cadence
    pub audio_interval_ms: u64,

    /// Visual label source polling cadence
    pub camera_interval_ms: u64,

    /// Activity source polling cadence
    pub activity_interval_ms: u64,

    /// Number of audio labels kept from each classification
    pub audio_top_k: usize,

    /// Event bus buffer size
    pub event_bus_capacity: usize,

    pub log_intervals: LogIntervals,

    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            mismatch_threshold_ms: 30_000,
            sample_interval_ms: 1_000,
            audio_interval_ms: 500,
            camera_interval_ms: 1_000,
            activity_interval_ms: 2_000,
            audio_top_k: 3,
            event_bus_capacity: 100,
            log_intervals: LogIntervals::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from `path`, or from the default location when None
    ///
    /// A missing file yields defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match common_config::default_config_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        let config: EngineConfig = common_config::load_toml_or_default(&path)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make a loop spin or never emit
    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("sample_interval_ms", self.sample_interval_ms),
            ("audio_interval_ms", self.audio_interval_ms),
            ("camera_interval_ms", self.camera_interval_ms),
            ("activity_interval_ms", self.activity_interval_ms),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than 0", name)));
            }
        }
        if self.audio_top_k == 0 {
            return Err(Error::Config("audio_top_k must be at least 1".to_string()));
        }
        if self.event_bus_capacity == 0 {
            return Err(Error::Config("event_bus_capacity must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Data folder, honouring CLI > ENVSENSE_DATA_DIR > config file > OS default
    pub fn resolve_data_dir(&self, cli_arg: Option<&Path>) -> PathBuf {
        common_config::resolve_data_folder(cli_arg, DATA_DIR_ENV, self.data_dir.as_deref())
    }
}

/// File layout inside the data folder
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn log_file(&self, stream: LogStream) -> PathBuf {
        self.root.join(format!("{}_log.csv", stream.as_str()))
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join("settings.toml")
    }
}
