//! File-backed document persistence with backup rotation.
//!
//! A [`StateStore`] owns one *slot*: a primary JSON file plus a directory of
//! timestamped backups of it. Fingerprints and sessions each get their own
//! slot.
//!
//! # Fail-Soft Loading
//!
//! [`StateStore::load`] never raises. It returns `None` for:
//! - a missing file (no prior state)
//! - empty or truncated JSON (crash mid-write)
//! - a document missing a required field or with the wrong shape
//!
//! Everything except the missing file is recorded in the error log.
//!
//! # Saving
//!
//! [`StateStore::save`] writes the primary file atomically (temp file +
//! rename), then a backup copy, then prunes the slot's backups to the
//! configured retention. Only the primary write decides the return value;
//! backup and prune problems are logged and otherwise ignored.

use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::error::Category;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{Result, SysmemError};
use crate::error_log::ErrorLog;
use crate::patterns::{format_backup_name, parse_backup_name};
use crate::storage::StorageConfig;

const COMPONENT: &str = "state_store";

/// A named document location: primary file plus its backup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    name: String,
    primary: PathBuf,
    backup_dir: PathBuf,
}

impl Slot {
    pub fn new(name: impl Into<String>, primary: PathBuf, backup_dir: PathBuf) -> Self {
        Self {
            name: name.into(),
            primary,
            backup_dir,
        }
    }

    /// `.claude/skill/sysmem/.fingerprint.json`, backups alongside it.
    pub fn fingerprint(storage: &StorageConfig) -> Self {
        Self::new("fingerprint", storage.fingerprint_file(), storage.skill_dir())
    }

    /// `session_state.json`, backups in `system/`.
    pub fn session(storage: &StorageConfig) -> Self {
        Self::new("session", storage.session_file(), storage.system_dir())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary(&self) -> &Path {
        &self.primary
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }
}

/// Typed persistence for one slot.
pub struct StateStore<D> {
    slot: Slot,
    retention: usize,
    errors: ErrorLog,
    _document: PhantomData<fn() -> D>,
}

impl<D> StateStore<D>
where
    D: Serialize + DeserializeOwned,
{
    pub fn new(slot: Slot, retention: usize, errors: ErrorLog) -> Self {
        Self {
            slot,
            retention,
            errors,
            _document: PhantomData,
        }
    }

    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    /// True if a primary file exists, valid or not.
    pub fn exists(&self) -> bool {
        self.slot.primary.exists()
    }

    /// Loads the primary document, or `None` if it is absent or unusable.
    pub fn load(&self) -> Option<D> {
        match self.try_load() {
            Ok(document) => document,
            Err(err) => {
                self.errors.log(COMPONENT, &err.to_string());
                None
            }
        }
    }

    /// Persists `document`. Returns `true` iff the primary file was written.
    pub fn save(&self, document: &D) -> bool {
        let payload = match serde_json::to_string_pretty(document) {
            Ok(payload) => payload,
            Err(err) => {
                let err = SysmemError::json(format!("serializing {} document", self.slot.name), err);
                self.errors.log(COMPONENT, &err.to_string());
                return false;
            }
        };

        if let Err(err) = self.write_primary(&payload) {
            self.errors.log(COMPONENT, &err.to_string());
            return false;
        }
        info!(slot = %self.slot.name, path = %self.slot.primary.display(), "Saved document");

        if let Err(err) = self.write_backup(&payload) {
            self.errors.log(COMPONENT, &err.to_string());
        }
        if let Err(err) = self.prune_backups() {
            self.errors.log(COMPONENT, &err.to_string());
        }

        true
    }

    /// Records a failure in the error log. Never fails.
    pub fn log_error(&self, component: &str, message: &str) {
        self.errors.log(component, message);
    }

    /// Backups of this slot, newest first.
    pub fn backups(&self) -> Vec<PathBuf> {
        match self.collect_backups() {
            Ok(backups) => backups.into_iter().map(|b| b.path).collect(),
            Err(err) => {
                debug!(error = %err, "Failed to list backups");
                Vec::new()
            }
        }
    }

    fn try_load(&self) -> Result<Option<D>> {
        let path = &self.slot.primary;
        let content = match fs_err::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(SysmemError::io(format!("reading {}", path.display()), err)),
        };

        if content.trim().is_empty() {
            return Err(SysmemError::Corrupt {
                path: path.clone(),
                details: "empty document".to_string(),
            });
        }

        serde_json::from_str::<D>(&content)
            .map(Some)
            .map_err(|err| match err.classify() {
                Category::Data => SysmemError::Schema {
                    path: path.clone(),
                    details: err.to_string(),
                },
                Category::Io | Category::Syntax | Category::Eof => SysmemError::Corrupt {
                    path: path.clone(),
                    details: err.to_string(),
                },
            })
    }

    fn write_primary(&self, payload: &str) -> Result<()> {
        let path = &self.slot.primary;
        let parent = path.parent().ok_or_else(|| {
            SysmemError::io(
                format!("resolving parent of {}", path.display()),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "no parent directory"),
            )
        })?;
        fs_err::create_dir_all(parent)
            .map_err(|err| SysmemError::io(format!("creating {}", parent.display()), err))?;

        let context = || format!("writing {}", path.display());
        let mut temp_file =
            NamedTempFile::new_in(parent).map_err(|err| SysmemError::io(context(), err))?;
        temp_file
            .write_all(payload.as_bytes())
            .map_err(|err| SysmemError::io(context(), err))?;
        temp_file
            .flush()
            .map_err(|err| SysmemError::io(context(), err))?;
        temp_file
            .persist(path)
            .map_err(|err| SysmemError::io(context(), err.error))?;
        Ok(())
    }

    fn write_backup(&self, payload: &str) -> Result<PathBuf> {
        let dir = &self.slot.backup_dir;
        fs_err::create_dir_all(dir)
            .map_err(|err| SysmemError::io(format!("creating {}", dir.display()), err))?;

        let unixtime = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
        let mut seq = 0;
        let mut path = dir.join(format_backup_name(&self.slot.name, unixtime, seq));
        while path.exists() {
            seq += 1;
            path = dir.join(format_backup_name(&self.slot.name, unixtime, seq));
        }

        fs_err::write(&path, payload)
            .map_err(|err| SysmemError::io(format!("writing backup {}", path.display()), err))?;
        debug!(path = %path.display(), "Wrote backup");
        Ok(path)
    }

    fn prune_backups(&self) -> Result<()> {
        let backups = self.collect_backups()?;
        for stale in backups.iter().skip(self.retention) {
            match fs_err::remove_file(&stale.path) {
                Ok(()) => debug!(path = %stale.path.display(), "Pruned backup"),
                Err(err) => self.errors.log(
                    COMPONENT,
                    &format!("Failed to delete backup {}: {}", stale.path.display(), err),
                ),
            }
        }
        Ok(())
    }

    /// Backups sorted newest first: by mtime, ties broken by the name's timestamp and sequence.
    fn collect_backups(&self) -> Result<Vec<BackupFile>> {
        let dir = &self.slot.backup_dir;
        let entries = match fs_err::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(SysmemError::io(format!("listing {}", dir.display()), err)),
        };

        let mut backups: Vec<BackupFile> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let file_name = entry.file_name();
                let parsed = parse_backup_name(file_name.to_str()?)?;
                if parsed.slot != self.slot.name {
                    return None;
                }
                let modified = entry.metadata().ok()?.modified().ok()?;
                Some(BackupFile {
                    path: entry.path(),
                    modified,
                    unixtime: parsed.unixtime,
                    seq: parsed.seq,
                })
            })
            .collect();

        backups.sort_by(|a, b| {
            (b.modified, b.unixtime, b.seq).cmp(&(a.modified, a.unixtime, a.seq))
        });
        Ok(backups)
    }
}

struct BackupFile {
    path: PathBuf,
    modified: std::time::SystemTime,
    unixtime: u64,
    seq: u32,
}
