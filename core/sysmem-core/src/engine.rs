//! SysmemEngine - one project's components, wired from its configuration.
//!
//! The engine is:
//! - **Synchronous**: No async runtime required
//! - **Project-rooted**: Every path comes from the project's `StorageConfig`
//! - **Stateless**: Each call reads and writes disk; nothing is cached
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use sysmem_core::SysmemEngine;
//!
//! let engine = SysmemEngine::open("/path/to/project");
//! let (report, fingerprint) = engine.check();
//! if report.should_collect {
//!     // ...collect, then
//!     engine.detector().commit(&fingerprint);
//! }
//! ```

use std::path::PathBuf;

use crate::classifier::{ChangeClassifier, ChangeReport};
use crate::config::{load_config_or_default, SysmemConfig};
use crate::detector::ChangeDetector;
use crate::error_log::ErrorLog;
use crate::fingerprint::{resolve_root, Fingerprint, FingerprintGenerator, FingerprintStore};
use crate::session::{SessionStateMachine, SessionStore};
use crate::state::Slot;
use crate::storage::StorageConfig;

pub struct SysmemEngine {
    storage: StorageConfig,
    config: SysmemConfig,
    errors: ErrorLog,
    detector: ChangeDetector,
    sessions: SessionStateMachine,
}

impl SysmemEngine {
    /// Opens the project at `root`, reading `.claude/skill/sysmem/config.toml` if present.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let storage = StorageConfig::with_root(resolve_root(&root.into()));
        let config = load_config_or_default(&storage.config_file());
        Self::with_config(storage, config)
    }

    /// Creates an engine with explicit storage and configuration.
    ///
    /// Used for testing with temp directories or custom settings.
    pub fn with_config(storage: StorageConfig, config: SysmemConfig) -> Self {
        let retention = config.storage.backup_retention;
        let errors = ErrorLog::new(storage.error_log_file(), config.storage.error_log_capacity)
            .within(storage.root());
        let mut scan = config.scan.clone();
        scan.exclude(storage.scan_exclusions());

        let detector = ChangeDetector::new(
            FingerprintGenerator::new(scan, errors.clone()),
            ChangeClassifier::new(config.thresholds.clone(), errors.clone()),
            FingerprintStore::new(Slot::fingerprint(&storage), retention, errors.clone()),
        );
        let sessions = SessionStateMachine::new(
            SessionStore::new(Slot::session(&storage), retention, errors.clone()),
            config.storage.error_log_capacity,
        )
        .with_project_path(storage.root().to_string_lossy());

        Self {
            storage,
            config,
            errors,
            detector,
            sessions,
        }
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn config(&self) -> &SysmemConfig {
        &self.config
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    pub fn sessions(&self) -> &SessionStateMachine {
        &self.sessions
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Project Root Shortcuts
    // ─────────────────────────────────────────────────────────────────────────────

    /// Fingerprints the project root.
    pub fn fingerprint(&self) -> Fingerprint {
        self.detector.generator().generate(self.storage.root())
    }

    /// Classifies the project root against the stored fingerprint.
    pub fn check(&self) -> (ChangeReport, Fingerprint) {
        self.detector.should_collect(self.storage.root())
    }

    /// Stores a fresh fingerprint of the project root.
    pub fn refresh(&self) -> bool {
        self.detector.refresh(self.storage.root())
    }
}
