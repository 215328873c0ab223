//! Storage configuration and path management for sysmem.
//!
//! Every document sysmem persists lives under the project it describes. This
//! module is the single place that knows those locations:
//!
//! ```text
//! <project>/
//! ├── .claude/skill/sysmem/
//! │   ├── .fingerprint.json                  previous snapshot
//! │   ├── fingerprint_backup_<unixtime>.json rotated snapshot backups
//! │   ├── config.toml                        optional overrides
//! │   └── logs/                              tracing output (CLI only)
//! ├── session_state.json                     current session
//! └── system/
//!     ├── session_backup_<unixtime>.json     rotated session backups
//!     └── error_log.json                     bounded error log
//! ```
//!
//! Callers of the core never touch these paths directly; components receive a
//! `StorageConfig` and ask it.

use std::path::{Path, PathBuf};

/// Central configuration for all sysmem storage paths of one project.
///
/// Tests use `StorageConfig::with_root(temp_dir)` for isolation, which is the
/// same constructor production uses with the real project root.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl StorageConfig {
    /// Creates a StorageConfig for the project rooted at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Skill Directory (.claude/skill/sysmem)
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to the skill data directory.
    pub fn skill_dir(&self) -> PathBuf {
        self.root.join(".claude").join("skill").join("sysmem")
    }

    /// Path to the stored fingerprint of the previous scan.
    pub fn fingerprint_file(&self) -> PathBuf {
        self.skill_dir().join(".fingerprint.json")
    }

    /// Path to the optional TOML overrides file.
    pub fn config_file(&self) -> PathBuf {
        self.skill_dir().join("config.toml")
    }

    /// Directory for rolling log files written by the CLI.
    pub fn log_dir(&self) -> PathBuf {
        self.skill_dir().join("logs")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Session Files
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to session_state.json (current session).
    pub fn session_file(&self) -> PathBuf {
        self.root.join("session_state.json")
    }

    /// Path to the system/ directory (session backups, error log).
    pub fn system_dir(&self) -> PathBuf {
        self.root.join("system")
    }

    /// Path to the bounded error log.
    pub fn error_log_file(&self) -> PathBuf {
        self.system_dir().join("error_log.json")
    }

    /// Root-relative keys of the documents above that sit inside the scanned
    /// tree. `.claude/` is hidden and never scanned, so it is not listed.
    pub fn scan_exclusions(&self) -> Vec<String> {
        [self.session_file(), self.system_dir()]
            .iter()
            .filter_map(|path| path.strip_prefix(&self.root).ok())
            .filter_map(|relative| relative.to_str().map(str::to_string))
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Directory Creation
    // ─────────────────────────────────────────────────────────────────────────────

    /// Ensures the skill and system directories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        fs_err::create_dir_all(self.skill_dir())?;
        fs_err::create_dir_all(self.system_dir())?;
        Ok(())
    }
}
