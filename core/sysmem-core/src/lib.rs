//! # sysmem-core
//!
//! Project fingerprinting, change classification and session state for the
//! sysmem skill.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency.
//! - **Single process**: No locking across processes; last writer wins.
//! - **Graceful degradation**: Missing or corrupt files read as absent, and
//!   classification faults fail open to a full re-collection.
//! - **Project-rooted**: All persisted state lives under the project it
//!   describes (see [`storage`]).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sysmem_core::SysmemEngine;
//!
//! let engine = SysmemEngine::open(".");
//! let (report, fingerprint) = engine.check();
//! println!("{:?} {:?}", report.level, report.recommendation());
//! ```

pub mod classifier;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod error_log;
pub mod fingerprint;
pub mod patterns;
pub mod session;
pub mod state;
pub mod storage;

pub use classifier::{
    assess_level, ChangeClassifier, ChangeLevel, ChangeReport, CollectionAction,
    TriggerCondition, DETECTION_ERROR, FIRST_SCAN, TRIGGER_CONDITIONS,
};
pub use config::{
    load_config, load_config_or_default, RetentionConfig, ScanConfig, SysmemConfig, Thresholds,
};
pub use detector::ChangeDetector;
pub use engine::SysmemEngine;
pub use error::{Result, SysmemError};
pub use error_log::{ErrorEntry, ErrorLog};
pub use fingerprint::{digest_file, Fingerprint, FingerprintGenerator, FingerprintStore};
pub use session::{SessionStateMachine, SessionStore};
pub use state::{
    Mode, NavigationRecord, SessionError, SessionInfo, SessionState, Slot, StateStore,
};
pub use storage::StorageConfig;
