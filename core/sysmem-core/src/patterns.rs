//! Compiled regex patterns for recognizing sysmem's own files.
//!
//! These patterns are compiled once on first use and reused throughout
//! the application.

use once_cell::sync::Lazy;
use regex::Regex;

// ═══════════════════════════════════════════════════════════════════════════════
// Backup File Names
// ═══════════════════════════════════════════════════════════════════════════════

/// `<slot>_backup_<unixtime>.json`, or `<slot>_backup_<unixtime>-<seq>.json`
/// when several backups land in the same second.
pub static RE_BACKUP_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<slot>[a-z0-9_]+?)_backup_(?P<ts>\d+)(?:-(?P<seq>\d+))?\.json$").unwrap()
});

/// Parsed components of a backup file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupName {
    pub slot: String,
    pub unixtime: u64,
    pub seq: u32,
}

/// Parses a backup file name, returning `None` for anything else.
pub fn parse_backup_name(file_name: &str) -> Option<BackupName> {
    let caps = RE_BACKUP_FILE.captures(file_name)?;
    let slot = caps.name("slot")?.as_str().to_string();
    let unixtime = caps.name("ts")?.as_str().parse().ok()?;
    let seq = match caps.name("seq") {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    Some(BackupName {
        slot,
        unixtime,
        seq,
    })
}

/// Formats a backup file name; `seq == 0` omits the suffix.
pub fn format_backup_name(slot: &str, unixtime: u64, seq: u32) -> String {
    if seq == 0 {
        format!("{}_backup_{}.json", slot, unixtime)
    } else {
        format!("{}_backup_{}-{}.json", slot, unixtime, seq)
    }
}
