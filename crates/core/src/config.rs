// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration
//!
//! All knobs have working defaults; a TOML file only needs the keys it
//! overrides:
//!
//! ```toml
//! [snapshot]
//! base_interval = 800
//! timer_interval = "5m"
//!
//! [autosave]
//! debounce = "250ms"
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Compression applied to serialized snapshot bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    #[default]
    Gzip,
}

impl Compression {
    /// Tag stored in the `snapshots.compression` column
    pub fn as_tag(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Compression::None),
            "gzip" => Ok(Compression::Gzip),
            other => Err(format!("unknown compression: {}", other)),
        }
    }
}

/// Snapshot cadence and memory guards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SnapshotConfig {
    /// Events between snapshots at a normal editing rate
    pub base_interval: u64,
    /// Interval multiplier while editing in bursts
    pub burst_multiplier: f64,
    /// Interval multiplier while editing sparsely
    pub idle_multiplier: f64,
    /// Events per second at or above which editing counts as a burst
    pub burst_threshold: f64,
    /// Events per second at or below which editing counts as idle
    pub idle_threshold: f64,
    /// Rolling window used to measure the editing rate
    #[serde(with = "humantime_serde")]
    pub rate_window: Duration,
    /// Wall-clock interval for the timer trigger
    #[serde(with = "humantime_serde")]
    pub timer_interval: Duration,
    /// Estimated size above which a warning is logged
    pub warn_bytes: u64,
    /// Estimated size above which the snapshot is refused
    pub max_bytes: u64,
    /// Snapshots retained per document (never fewer than two)
    pub keep_snapshots: usize,
    pub compression: Compression,
    /// Backlog at which a manual save also writes a snapshot
    pub save_snapshot_min_backlog: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            base_interval: 500,
            burst_multiplier: 0.5,
            idle_multiplier: 2.0,
            burst_threshold: 20.0,
            idle_threshold: 2.0,
            rate_window: Duration::from_secs(60),
            timer_interval: Duration::from_secs(10 * 60),
            warn_bytes: 50 * 1024 * 1024,
            max_bytes: 200 * 1024 * 1024,
            keep_snapshots: 2,
            compression: Compression::Gzip,
            save_snapshot_min_backlog: 1,
        }
    }
}

impl SnapshotConfig {
    /// Retention count with the two-snapshot floor applied
    pub fn retained_snapshots(&self) -> usize {
        self.keep_snapshots.max(2)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.base_interval == 0 {
            return Err(ConfigError::Invalid(
                "snapshot.base_interval must be positive".to_string(),
            ));
        }
        if !(self.burst_multiplier > 0.0 && self.idle_multiplier > 0.0) {
            return Err(ConfigError::Invalid(
                "snapshot multipliers must be positive".to_string(),
            ));
        }
        if self.idle_threshold >= self.burst_threshold {
            return Err(ConfigError::Invalid(
                "snapshot.idle_threshold must be below burst_threshold".to_string(),
            ));
        }
        if self.rate_window.is_zero() {
            return Err(ConfigError::Invalid(
                "snapshot.rate_window must be positive".to_string(),
            ));
        }
        if self.timer_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "snapshot.timer_interval must be positive".to_string(),
            ));
        }
        if self.warn_bytes > self.max_bytes {
            return Err(ConfigError::Invalid(
                "snapshot.warn_bytes must not exceed max_bytes".to_string(),
            ));
        }
        Ok(())
    }
}

/// Auto-save debounce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutoSaveConfig {
    #[serde(with = "humantime_serde")]
    pub debounce: Duration,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(200),
        }
    }
}

/// Navigator state cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NavigatorConfig {
    /// Reconstructed states kept for repeated undo/redo
    pub cache_capacity: usize,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self { cache_capacity: 16 }
    }
}

/// Top-level configuration for a document session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub snapshot: SnapshotConfig,
    pub autosave: AutoSaveConfig,
    pub navigator: NavigatorConfig,
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(s)?;
        config.snapshot.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
