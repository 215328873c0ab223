//! Bounded, persisted error log (`system/error_log.json`).
//!
//! Components receive an `ErrorLog` at construction and report soft failures
//! through it. Writing the log can never fail the caller: every I/O or
//! serialization problem inside [`ErrorLog::log`] is discarded.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_ERROR_LOG_CAPACITY;
use crate::error::{Result, SysmemError};

/// One recorded failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub timestamp: DateTime<Utc>,
    pub component: String,
    pub message: String,
}

/// Handle to the error log document of one project.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: Option<PathBuf>,
    capacity: usize,
    project_root: Option<PathBuf>,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: Some(path.into()),
            capacity,
            project_root: None,
        }
    }

    /// Only persist entries while `root` exists as a directory. A log for a
    /// missing project never creates it.
    pub fn within(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    /// An error log that only emits tracing events.
    pub fn disabled() -> Self {
        Self {
            path: None,
            capacity: DEFAULT_ERROR_LOG_CAPACITY,
            project_root: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Appends an entry, keeping the newest `capacity` entries.
    pub fn log(&self, component: &str, message: &str) {
        tracing::warn!(component, message, "sysmem error");

        let Some(path) = self.path.as_deref() else {
            return;
        };
        if self.project_root.as_deref().is_some_and(|root| !root.is_dir()) {
            return;
        }
        if let Err(err) = self.append(path, component, message) {
            tracing::debug!(error = %err, "Failed to persist error log entry");
        }
    }

    /// Returns the persisted entries, oldest first. Unreadable logs read as empty.
    pub fn entries(&self) -> Vec<ErrorEntry> {
        self.path
            .as_deref()
            .and_then(|p| fs_err::read_to_string(p).ok())
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    fn append(&self, path: &Path, component: &str, message: &str) -> Result<()> {
        let mut entries = self.entries();
        entries.push(ErrorEntry {
            timestamp: Utc::now(),
            component: component.to_string(),
            message: message.to_string(),
        });
        if entries.len() > self.capacity {
            let excess = entries.len() - self.capacity;
            entries.drain(..excess);
        }

        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)
                .map_err(|err| SysmemError::io(format!("creating {}", parent.display()), err))?;
        }
        let content = serde_json::to_string_pretty(&entries)
            .map_err(|err| SysmemError::json("serializing error log", err))?;
        fs_err::write(path, content)
            .map_err(|err| SysmemError::io(format!("writing {}", path.display()), err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_log_creates_file_and_parent() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("system").join("error_log.json");
        let log = ErrorLog::new(&path, 100);

        log.log("state_store", "primary write failed");

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].component, "state_store");
        assert_eq!(entries[0].message, "primary write failed");
    }

    #[test]
    fn test_log_keeps_newest_entries_only() {
        let temp = tempdir().unwrap();
        let log = ErrorLog::new(temp.path().join("error_log.json"), 3);

        for i in 0..5 {
            log.log("test", &format!("message {}", i));
        }

        let messages: Vec<_> = log.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["message 2", "message 3", "message 4"]);
    }

    #[test]
    fn test_log_never_creates_missing_project() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("missing");
        let log = ErrorLog::new(root.join("system").join("error_log.json"), 100).within(&root);

        log.log("fingerprint", "root does not exist");

        assert!(!root.exists());
        assert!(log.entries().is_empty());
    }

    #[test]
    fn test_log_within_existing_project_persists() {
        let temp = tempdir().unwrap();
        let log = ErrorLog::new(temp.path().join("system").join("error_log.json"), 100)
            .within(temp.path());

        log.log("fingerprint", "kept");

        assert_eq!(log.entries().len(), 1);
    }

    #[test]
    fn test_log_recovers_from_corrupt_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("error_log.json");
        fs_err::write(&path, "[{not json").unwrap();
        let log = ErrorLog::new(&path, 100);

        log.log("test", "after corruption");

        assert_eq!(log.entries().len(), 1);
    }

    #[test]
    fn test_log_swallows_unwritable_path() {
        let temp = tempdir().unwrap();
        // A regular file where the parent directory should be.
        let blocker = temp.path().join("system");
        fs_err::write(&blocker, "file").unwrap();
        let log = ErrorLog::new(blocker.join("error_log.json"), 100);

        log.log("test", "cannot be written");

        assert!(log.entries().is_empty());
    }

    #[test]
    fn test_disabled_log_has_no_entries() {
        let log = ErrorLog::disabled();
        log.log("test", "ignored");
        assert!(log.entries().is_empty());
        assert!(log.path().is_none());
    }
}
