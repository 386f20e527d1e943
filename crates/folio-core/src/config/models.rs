use super::defaults;
use crate::settings::ReaderKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Driver configuration; deserializable from sectioned TOML.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct FolioConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub surface: SurfaceConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub level: LogLevel,
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::default_log_level(),
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "crate::config::defaults::default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SyncConfig {
    #[serde(default = "crate::config::defaults::default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: defaults::default_debounce_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SurfaceConfig {
    #[serde(default = "crate::config::defaults::default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    #[serde(default = "crate::config::defaults::default_reader_kind")]
    pub reader_kind: ReaderKind,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: defaults::default_frame_interval_ms(),
            reader_kind: defaults::default_reader_kind(),
        }
    }
}

impl FolioConfig {
    /// Pull every numeric knob back into its supported range.
    pub fn clamped(mut self) -> Self {
        self.sync.debounce_ms = self
            .sync
            .debounce_ms
            .clamp(defaults::MIN_DEBOUNCE_MS, defaults::MAX_DEBOUNCE_MS);
        self.surface.frame_interval_ms = self.surface.frame_interval_ms.clamp(
            defaults::MIN_FRAME_INTERVAL_MS,
            defaults::MAX_FRAME_INTERVAL_MS,
        );
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.sync.debounce_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.surface.frame_interval_ms)
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir)
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
