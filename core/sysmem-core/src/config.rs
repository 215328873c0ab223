//! Configuration loading for sysmem.
//!
//! Every setting has a default, so a project without
//! `.claude/skill/sysmem/config.toml` behaves exactly like one with an empty
//! file. A file that cannot be read or parsed is reported and ignored;
//! configuration never blocks change detection.
//!
//! ```toml
//! [thresholds]
//! structure_file_delta = 50
//! marker_mtime_tolerance_secs = 1.0
//!
//! [scan]
//! marker_file = "CLAUDE.md"
//! source_extensions = ["py"]
//!
//! [storage]
//! backup_retention = 5
//! error_log_capacity = 100
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SysmemError};

/// File-count swing above which the project structure counts as changed.
pub const DEFAULT_STRUCTURE_FILE_DELTA: u64 = 50;
/// Marker mtime drift (seconds) tolerated before the marker counts as changed.
pub const DEFAULT_MARKER_MTIME_TOLERANCE_SECS: f64 = 1.0;
/// Backups kept per document slot.
pub const DEFAULT_BACKUP_RETENTION: usize = 5;
/// Entries kept in the error log and in a session's error ring.
pub const DEFAULT_ERROR_LOG_CAPACITY: usize = 100;

/// Thresholds consulted by the change classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub structure_file_delta: u64,
    pub marker_mtime_tolerance_secs: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            structure_file_delta: DEFAULT_STRUCTURE_FILE_DELTA,
            marker_mtime_tolerance_secs: DEFAULT_MARKER_MTIME_TOLERANCE_SECS,
        }
    }
}

/// What the fingerprint walk skips and how it classifies files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Marker document looked up at the project root.
    pub marker_file: String,
    /// Extensions (without dot) of the project's primary source language.
    pub source_extensions: Vec<String>,
    /// Directory names never descended into, in addition to hidden entries.
    pub skip_dirs: Vec<String>,
    /// Root-level file names recognized as build/config files.
    pub config_names: Vec<String>,
    /// Root-level file extensions recognized as build/config files.
    pub config_extensions: Vec<String>,
    /// Root-relative paths (`/`-separated) never scanned: sysmem's own
    /// documents that live inside the project tree.
    pub exclude_paths: Vec<String>,
}

impl ScanConfig {
    /// Adds `paths` to the exclusions, skipping ones already present.
    pub fn exclude<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for path in paths {
            let path = path.into();
            if !self.exclude_paths.contains(&path) {
                self.exclude_paths.push(path);
            }
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            marker_file: "CLAUDE.md".to_string(),
            source_extensions: vec!["py".to_string()],
            skip_dirs: ["node_modules", "__pycache__", "target", "build", "dist"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            config_names: [
                "package.json",
                "requirements.txt",
                "pyproject.toml",
                "setup.py",
                "setup.cfg",
                "Makefile",
                "Dockerfile",
                "Cargo.toml",
                "Cargo.lock",
                "go.mod",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            config_extensions: vec!["yml".to_string(), "yaml".to_string()],
            exclude_paths: vec!["session_state.json".to_string(), "system".to_string()],
        }
    }
}

/// Retention limits for persisted documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub backup_retention: usize,
    pub error_log_capacity: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            backup_retention: DEFAULT_BACKUP_RETENTION,
            error_log_capacity: DEFAULT_ERROR_LOG_CAPACITY,
        }
    }
}

/// Top-level sysmem configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SysmemConfig {
    pub thresholds: Thresholds,
    pub scan: ScanConfig,
    pub storage: RetentionConfig,
}

/// Reads configuration from `path`. A missing file yields defaults.
pub fn load_config(path: &Path) -> Result<SysmemConfig> {
    if !path.exists() {
        return Ok(SysmemConfig::default());
    }

    let content = fs_err::read_to_string(path)
        .map_err(|err| SysmemError::io(format!("reading {}", path.display()), err))?;
    toml::from_str::<SysmemConfig>(&content).map_err(|err| SysmemError::Config {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}

/// Reads configuration from `path`, falling back to defaults on any failure.
pub fn load_config_or_default(path: &Path) -> SysmemConfig {
    match load_config(path) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load sysmem config; using defaults");
            SysmemConfig::default()
        }
    }
}
