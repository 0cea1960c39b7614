//! File-based configuration.
//!
//! Everything has a default, so an empty file (or no file) is valid.

use crate::capture::{ConstraintError, ConstraintTable, DeviceClass};
use crate::scanner::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Scanner behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Delay before binding the decoder to a new video sink.
    pub mount_delay_ms: u64,
    /// Sink pause during a focus nudge.
    pub focus_pause_ms: u64,
    /// Camera to prefer when present.
    pub preferred_device: Option<String>,
    /// Forces a device class instead of classifying `user_agent`.
    pub device_class: Option<DeviceClass>,
    /// User agent fed to the device classifier.
    pub user_agent: Option<String>,
    /// Capacity of the recent results log.
    pub result_log_capacity: usize,
    /// Decoder worker threads (0 = available parallelism).
    pub workers: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            mount_delay_ms: 200,
            focus_pause_ms: 100,
            preferred_device: None,
            device_class: None,
            user_agent: None,
            result_log_capacity: 50,
            workers: 0,
        }
    }
}

impl ScannerConfig {
    /// Device class from the override, else from the user agent.
    pub fn device_class(&self) -> DeviceClass {
        self.device_class.unwrap_or_else(|| {
            self.user_agent
                .as_deref()
                .map(DeviceClass::classify)
                .unwrap_or_default()
        })
    }
}

/// Inventory storage location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `supermarket_products.json`.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// `[scanner]` section.
    #[serde(default)]
    pub scanner: ScannerConfig,
    /// `[constraints.*]` sections. Each key overrides the built-in profile value.
    #[serde(default)]
    pub constraints: ConstraintTable,
    /// `[storage]` section.
    #[serde(default)]
    pub storage: StorageConfig,
    /// `[output]` section.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// A constraint profile is invalid.
    #[error(transparent)]
    Constraints(#[from] ConstraintError),
    /// `result_log_capacity` is zero.
    #[error("result log capacity must be at least 1")]
    InvalidLogCapacity,
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The file is not valid TOML for this layout.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.constraints.validate()?;
        if self.scanner.result_log_capacity == 0 {
            return Err(ConfigError::InvalidLogCapacity);
        }
        Ok(())
    }

    /// Session manager settings derived from this file.
    pub fn session_config(&self) -> SessionConfig {
        let defaults = SessionConfig::default();
        SessionConfig {
            device_class: self.scanner.device_class(),
            constraints: self.constraints.clone(),
            mount_delay: Duration::from_millis(self.scanner.mount_delay_ms),
            focus_pause: Duration::from_millis(self.scanner.focus_pause_ms),
            preferred_device: self.scanner.preferred_device.clone(),
            workers: match self.scanner.workers {
                0 => defaults.workers,
                n => n,
            },
        }
    }
}
