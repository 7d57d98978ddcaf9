// In: src/config.rs

//! The single source of truth for atomflow runtime configuration.
//!
//! This module defines the unified `AtomflowConfig` struct, which is designed to be
//! created once at the application boundary (e.g., from a user's JSON file) and then
//! passed down by reference to the components that need it: the checkpoint codec,
//! the display helpers and the logger.
//!
//! Every field has a serde default, so an empty JSON object is a valid config.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ComposeError, Result};

//==================================================================================
// I. Checkpoint Configuration
//==================================================================================

/// Lossless compression applied to each state payload stream in a checkpoint.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(tag = "codec", rename_all = "snake_case")]
pub enum StateCompression {
    /// **Default:** payloads are stored as raw element bytes.
    #[default]
    None,
    /// Each payload stream is a Zstandard frame at the given level.
    Zstd {
        #[serde(default = "default_zstd_level")]
        level: i32,
    },
}

/// Controls how StateAtom state is written to and read from durable storage.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CheckpointConfig {
    #[serde(default)]
    pub compression: StateCompression,

    /// If true, `load_state` rejects archives whose state names differ from the
    /// names declared by the receiving atom. Disabling this only makes sense when
    /// migrating checkpoints between renamed state parameters.
    #[serde(default = "default_true")]
    pub verify_names: bool,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            compression: StateCompression::default(),
            verify_names: true,
        }
    }
}

//==================================================================================
// II. Display & Logging Configuration
//==================================================================================

/// Settings for the human-readable rendering of atoms and sequences.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Arguments whose rendering is longer than this are shown as `<type>`.
    #[serde(default = "default_max_arg_width")]
    pub max_arg_width: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_arg_width: default_max_arg_width(),
        }
    }
}

/// Settings consumed by `observability::init_logging`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// One of `off`, `error`, `warn`, `info`, `debug`, `trace`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Optional file the log is appended to instead of stderr.
    #[serde(default)]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

//==================================================================================
// III. The Unified AtomflowConfig
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomflowConfig {
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AtomflowConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ComposeError::Config(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    fn validate(&self) -> Result<()> {
        if let StateCompression::Zstd { level } = self.checkpoint.compression {
            if !(1..=22).contains(&level) {
                return Err(ComposeError::Config(format!(
                    "Zstd level must be within 1..=22, got {}",
                    level
                )));
            }
        }
        if self.logging.level.parse::<log::LevelFilter>().is_err() {
            return Err(ComposeError::Config(format!(
                "Unknown log level '{}'",
                self.logging.level
            )));
        }
        Ok(())
    }
}

/// Helper for `serde` to default a boolean field to true.
fn default_true() -> bool {
    true
}

fn default_zstd_level() -> i32 {
    3
}

fn default_max_arg_width() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}
