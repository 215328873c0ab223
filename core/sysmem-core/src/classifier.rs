//! Change classification between two fingerprints.
//!
//! Trigger rules are a fixed, ordered table of pure predicates. Every rule is
//! evaluated (no short-circuit) so a report lists all reasons, in table order,
//! and its level is the highest severity among the rules that fired.
//!
//! | # | rule | level |
//! |---|------|-------|
//! | 1 | `claude_md_changed` | HIGH |
//! | 2 | `config_files_changed` | HIGH |
//! | 3 | `structure_changed` | HIGH |
//! | 4 | `modified_files` | MEDIUM |
//! | 5 | `new_files` | MEDIUM |
//! | 6 | `deleted_files` | MEDIUM |
//! | 7 | `source_files_changed` | MEDIUM |
//!
//! With no previous fingerprint the report is always `first_scan` / HIGH. Any
//! fault while evaluating fails open to `detection_error` / HIGH: uncertainty
//! means re-collect, never skip.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Thresholds;
use crate::error::{Result, SysmemError};
use crate::error_log::ErrorLog;
use crate::fingerprint::Fingerprint;

const COMPONENT: &str = "change_classifier";

/// Reported when no previous fingerprint exists.
pub const FIRST_SCAN: &str = "first_scan";
/// Reported when classification itself failed.
pub const DETECTION_ERROR: &str = "detection_error";

/// Collection urgency.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeLevel {
    #[default]
    Low,
    Medium,
    High,
}

/// What a caller should do for a given level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionAction {
    /// Optional; the caller decides.
    Optional,
    Incremental,
    Full,
}

impl ChangeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeLevel::Low => "LOW",
            ChangeLevel::Medium => "MEDIUM",
            ChangeLevel::High => "HIGH",
        }
    }

    pub fn action(&self) -> CollectionAction {
        match self {
            ChangeLevel::Low => CollectionAction::Optional,
            ChangeLevel::Medium => CollectionAction::Incremental,
            ChangeLevel::High => CollectionAction::Full,
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            ChangeLevel::Low => "Minor changes; collection is optional",
            ChangeLevel::Medium => "Incremental collection recommended",
            ChangeLevel::High => "Full collection required",
        }
    }
}

impl fmt::Display for ChangeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Predicate = fn(&Fingerprint, &Fingerprint, &Thresholds) -> bool;

/// A named, stateless rule with a fixed severity.
pub struct TriggerCondition {
    pub name: &'static str,
    pub level: ChangeLevel,
    pub description: &'static str,
    predicate: Predicate,
}

impl TriggerCondition {
    pub fn check(&self, old: &Fingerprint, new: &Fingerprint, thresholds: &Thresholds) -> bool {
        (self.predicate)(old, new, thresholds)
    }
}

impl fmt::Debug for TriggerCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerCondition")
            .field("name", &self.name)
            .field("level", &self.level)
            .finish()
    }
}

/// The rule table, in evaluation (and reporting) order.
pub static TRIGGER_CONDITIONS: [TriggerCondition; 7] = [
    TriggerCondition {
        name: "claude_md_changed",
        level: ChangeLevel::High,
        description: "Marker document added, removed or touched",
        predicate: claude_md_changed,
    },
    TriggerCondition {
        name: "config_files_changed",
        level: ChangeLevel::High,
        description: "Build/config files added, removed or edited",
        predicate: config_files_changed,
    },
    TriggerCondition {
        name: "structure_changed",
        level: ChangeLevel::High,
        description: "Directory layout changed or file count swung sharply",
        predicate: structure_changed,
    },
    TriggerCondition {
        name: "modified_files",
        level: ChangeLevel::Medium,
        description: "Existing files changed content",
        predicate: modified_files,
    },
    TriggerCondition {
        name: "new_files",
        level: ChangeLevel::Medium,
        description: "Files added",
        predicate: new_files,
    },
    TriggerCondition {
        name: "deleted_files",
        level: ChangeLevel::Medium,
        description: "Files deleted",
        predicate: deleted_files,
    },
    TriggerCondition {
        name: "source_files_changed",
        level: ChangeLevel::Medium,
        description: "Set of source files changed",
        predicate: source_files_changed,
    },
];

fn claude_md_changed(old: &Fingerprint, new: &Fingerprint, thresholds: &Thresholds) -> bool {
    if old.claude_md_exists != new.claude_md_exists {
        return true;
    }
    old.claude_md_exists
        && (old.claude_md_mtime - new.claude_md_mtime).abs() > thresholds.marker_mtime_tolerance_secs
}

fn config_files_changed(old: &Fingerprint, new: &Fingerprint, _: &Thresholds) -> bool {
    if old.config_files != new.config_files {
        return true;
    }
    new.config_files.iter().any(|path| {
        match (old.file_hashes.get(path), new.file_hashes.get(path)) {
            (Some(before), Some(after)) => before != after,
            _ => false,
        }
    })
}

fn structure_changed(old: &Fingerprint, new: &Fingerprint, thresholds: &Thresholds) -> bool {
    old.dir_structure != new.dir_structure
        || old.total_files.abs_diff(new.total_files) > thresholds.structure_file_delta
}

fn modified_files(old: &Fingerprint, new: &Fingerprint, _: &Thresholds) -> bool {
    new.file_hashes
        .iter()
        .any(|(path, digest)| old.file_hashes.get(path).is_some_and(|prev| prev != digest))
}

fn new_files(old: &Fingerprint, new: &Fingerprint, _: &Thresholds) -> bool {
    new.file_hashes
        .keys()
        .any(|path| !old.file_hashes.contains_key(path))
}

fn deleted_files(old: &Fingerprint, new: &Fingerprint, _: &Thresholds) -> bool {
    old.file_hashes
        .keys()
        .any(|path| !new.file_hashes.contains_key(path))
}

fn source_files_changed(old: &Fingerprint, new: &Fingerprint, _: &Thresholds) -> bool {
    old.source_files != new.source_files
}

/// Outcome of a classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub should_collect: bool,
    pub triggered_conditions: Vec<String>,
    pub level: ChangeLevel,
}

impl ChangeReport {
    pub fn unchanged() -> Self {
        Self {
            should_collect: false,
            triggered_conditions: Vec::new(),
            level: ChangeLevel::Low,
        }
    }

    pub fn first_scan() -> Self {
        Self::forced(FIRST_SCAN)
    }

    pub fn detection_error() -> Self {
        Self::forced(DETECTION_ERROR)
    }

    fn forced(reason: &str) -> Self {
        Self {
            should_collect: true,
            triggered_conditions: vec![reason.to_string()],
            level: ChangeLevel::High,
        }
    }

    fn from_triggered(triggered: &[&TriggerCondition]) -> Self {
        if triggered.is_empty() {
            return Self::unchanged();
        }
        Self {
            should_collect: true,
            triggered_conditions: triggered.iter().map(|c| c.name.to_string()).collect(),
            level: triggered
                .iter()
                .map(|c| c.level)
                .max()
                .unwrap_or(ChangeLevel::Low),
        }
    }

    pub fn action(&self) -> CollectionAction {
        self.level.action()
    }

    /// `None` when nothing needs collecting.
    pub fn recommendation(&self) -> Option<&'static str> {
        self.should_collect.then(|| self.level.recommendation())
    }
}

/// Recomputes the aggregate level from condition names.
///
/// Unknown names count as LOW.
pub fn assess_level<S: AsRef<str>>(names: &[S]) -> ChangeLevel {
    names
        .iter()
        .map(|name| match name.as_ref() {
            FIRST_SCAN | DETECTION_ERROR => ChangeLevel::High,
            other => TRIGGER_CONDITIONS
                .iter()
                .find(|c| c.name == other)
                .map_or(ChangeLevel::Low, |c| c.level),
        })
        .max()
        .unwrap_or(ChangeLevel::Low)
}

/// Evaluates the rule table against fingerprint pairs.
#[derive(Debug, Clone)]
pub struct ChangeClassifier {
    thresholds: Thresholds,
    errors: ErrorLog,
}

impl ChangeClassifier {
    pub fn new(thresholds: Thresholds, errors: ErrorLog) -> Self {
        Self { thresholds, errors }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Classifies the change from `old` (absent on first run) to `new`.
    pub fn classify(&self, old: Option<&Fingerprint>, new: &Fingerprint) -> ChangeReport {
        let Some(old) = old else {
            debug!("No previous fingerprint; treating as first scan");
            return ChangeReport::first_scan();
        };

        match self.evaluate(old, new) {
            Ok(report) => {
                debug!(
                    level = %report.level,
                    triggered = ?report.triggered_conditions,
                    "Classified changes"
                );
                report
            }
            Err(err) => {
                self.errors.log(COMPONENT, &err.to_string());
                ChangeReport::detection_error()
            }
        }
    }

    fn evaluate(&self, old: &Fingerprint, new: &Fingerprint) -> Result<ChangeReport> {
        let tolerance = self.thresholds.marker_mtime_tolerance_secs;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(SysmemError::Classification(format!(
                "invalid marker mtime tolerance {}",
                tolerance
            )));
        }
        check_fingerprint(old, "previous")?;
        check_fingerprint(new, "current")?;

        let triggered: Vec<&TriggerCondition> = TRIGGER_CONDITIONS
            .iter()
            .filter(|condition| condition.check(old, new, &self.thresholds))
            .collect();
        Ok(ChangeReport::from_triggered(&triggered))
    }
}

fn check_fingerprint(fp: &Fingerprint, label: &str) -> Result<()> {
    if !fp.is_consistent() {
        return Err(SysmemError::Classification(format!(
            "{} fingerprint reports {} files but hashes {}",
            label,
            fp.total_files,
            fp.file_hashes.len()
        )));
    }
    if !fp.claude_md_mtime.is_finite() {
        return Err(SysmemError::Classification(format!(
            "{} fingerprint has a non-finite marker mtime",
            label
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::{BTreeMap, BTreeSet};

    fn fingerprint(files: &[(&str, &str)]) -> Fingerprint {
        let file_hashes: BTreeMap<String, String> = files
            .iter()
            .map(|(p, h)| (p.to_string(), h.to_string()))
            .collect();
        Fingerprint {
            root_path: "/project".to_string(),
            scanned_at: Utc::now(),
            total_files: file_hashes.len() as u64,
            file_hashes,
            claude_md_exists: true,
            claude_md_mtime: 1_700_000_000.0,
            config_files: BTreeSet::from(["package.json".to_string()]),
            dir_structure: BTreeSet::from(["src".to_string()]),
            source_files: BTreeSet::from(["src/app.py".to_string()]),
        }
    }

    fn base() -> Fingerprint {
        fingerprint(&[
            ("CLAUDE.md", "m1"),
            ("package.json", "c1"),
            ("src/app.py", "a1"),
            ("src/notes.txt", "n1"),
        ])
    }

    fn classifier() -> ChangeClassifier {
        ChangeClassifier::new(Thresholds::default(), ErrorLog::disabled())
    }

    fn with_file_count(count: usize) -> Fingerprint {
        let mut fp = base();
        for i in 0..count {
            fp.file_hashes.insert(format!("src/gen_{}.txt", i), "x".to_string());
        }
        fp.total_files = fp.file_hashes.len() as u64;
        fp
    }

    #[test]
    fn test_absent_previous_is_first_scan() {
        let report = classifier().classify(None, &base());
        assert!(report.should_collect);
        assert_eq!(report.triggered_conditions, vec!["first_scan"]);
        assert_eq!(report.level, ChangeLevel::High);
    }

    #[test]
    fn test_identical_fingerprints_do_not_trigger() {
        let fp = base();
        let report = classifier().classify(Some(&fp), &fp);
        assert_eq!(report, ChangeReport::unchanged());
        assert!(report.recommendation().is_none());
    }

    #[test]
    fn test_single_new_file_triggers_only_new_files() {
        let old = base();
        let mut new = base();
        new.file_hashes
            .insert("src/todo.txt".to_string(), "t1".to_string());
        new.total_files += 1;

        let report = classifier().classify(Some(&old), &new);
        assert!(report.should_collect);
        assert_eq!(report.triggered_conditions, vec!["new_files"]);
        assert_eq!(report.level, ChangeLevel::Medium);
        assert_eq!(report.action(), CollectionAction::Incremental);
    }

    #[test]
    fn test_deleted_file_triggers_deleted_files() {
        let old = base();
        let mut new = base();
        new.file_hashes.remove("src/notes.txt");
        new.total_files -= 1;

        let report = classifier().classify(Some(&old), &new);
        assert_eq!(report.triggered_conditions, vec!["deleted_files"]);
    }

    #[test]
    fn test_marker_removed_is_high() {
        let old = base();
        let mut new = base();
        new.claude_md_exists = false;
        new.claude_md_mtime = 0.0;

        let report = classifier().classify(Some(&old), &new);
        assert_eq!(report.triggered_conditions, vec!["claude_md_changed"]);
        assert_eq!(report.level, ChangeLevel::High);
        assert_eq!(report.action(), CollectionAction::Full);
    }

    #[test]
    fn test_marker_mtime_within_tolerance_is_ignored() {
        let old = base();
        let mut new = base();
        new.claude_md_mtime += 1.0;
        assert!(classifier()
            .classify(Some(&old), &new)
            .triggered_conditions
            .is_empty());

        new.claude_md_mtime += 0.5;
        assert_eq!(
            classifier().classify(Some(&old), &new).triggered_conditions,
            vec!["claude_md_changed"]
        );
    }

    #[test]
    fn test_marker_mtime_ignored_when_both_absent() {
        let mut old = base();
        old.claude_md_exists = false;
        old.claude_md_mtime = 0.0;
        let mut new = old.clone();
        new.claude_md_mtime = 99.0;

        assert!(!claude_md_changed(&old, &new, &Thresholds::default()));
    }

    #[test]
    fn test_file_count_delta_boundary_is_strict() {
        let old = base();
        let fifty = with_file_count(50);
        let report = classifier().classify(Some(&old), &fifty);
        assert!(!report
            .triggered_conditions
            .contains(&"structure_changed".to_string()));

        let fifty_one = with_file_count(51);
        let report = classifier().classify(Some(&old), &fifty_one);
        assert!(report
            .triggered_conditions
            .contains(&"structure_changed".to_string()));
        assert_eq!(report.level, ChangeLevel::High);
    }

    #[test]
    fn test_overridden_delta_threshold() {
        let thresholds = Thresholds {
            structure_file_delta: 2,
            ..Thresholds::default()
        };
        let classifier = ChangeClassifier::new(thresholds, ErrorLog::disabled());
        let report = classifier.classify(Some(&base()), &with_file_count(3));
        assert!(report
            .triggered_conditions
            .contains(&"structure_changed".to_string()));
    }

    #[test]
    fn test_config_edit_reports_all_reasons_in_table_order() {
        let old = base();
        let mut new = base();
        new.file_hashes
            .insert("package.json".to_string(), "c2".to_string());
        new.file_hashes
            .insert("src/app.py".to_string(), "a2".to_string());
        new.file_hashes.insert("src/new.py".to_string(), "b1".to_string());
        new.source_files.insert("src/new.py".to_string());
        new.total_files += 1;

        let report = classifier().classify(Some(&old), &new);
        assert_eq!(
            report.triggered_conditions,
            vec![
                "config_files_changed",
                "modified_files",
                "new_files",
                "source_files_changed"
            ]
        );
        assert_eq!(report.level, ChangeLevel::High);
    }

    #[test]
    fn test_directory_change_triggers_structure() {
        let old = base();
        let mut new = base();
        new.dir_structure.insert("docs".to_string());

        let report = classifier().classify(Some(&old), &new);
        assert_eq!(report.triggered_conditions, vec!["structure_changed"]);
    }

    #[test]
    fn test_inconsistent_fingerprint_fails_open() {
        let temp = tempfile::tempdir().unwrap();
        let errors = ErrorLog::new(temp.path().join("error_log.json"), 100);
        let classifier = ChangeClassifier::new(Thresholds::default(), errors.clone());
        let old = base();
        let mut new = base();
        new.total_files = 999;

        let report = classifier.classify(Some(&old), &new);
        assert_eq!(report, ChangeReport::detection_error());
        assert_eq!(errors.entries().len(), 1);
        assert_eq!(errors.entries()[0].component, "change_classifier");
    }

    #[test]
    fn test_invalid_tolerance_fails_open() {
        let thresholds = Thresholds {
            marker_mtime_tolerance_secs: f64::NAN,
            ..Thresholds::default()
        };
        let classifier = ChangeClassifier::new(thresholds, ErrorLog::disabled());
        let fp = base();
        assert_eq!(
            classifier.classify(Some(&fp), &fp),
            ChangeReport::detection_error()
        );
    }

    #[test]
    fn test_assess_level_from_names() {
        assert_eq!(assess_level::<&str>(&[]), ChangeLevel::Low);
        assert_eq!(assess_level(&["new_files"]), ChangeLevel::Medium);
        assert_eq!(
            assess_level(&["new_files", "structure_changed"]),
            ChangeLevel::High
        );
        assert_eq!(assess_level(&["detection_error"]), ChangeLevel::High);
        assert_eq!(assess_level(&["something_else"]), ChangeLevel::Low);
    }

    #[test]
    fn test_level_ordering_and_serialization() {
        assert!(ChangeLevel::High > ChangeLevel::Medium);
        assert!(ChangeLevel::Medium > ChangeLevel::Low);
        assert_eq!(
            serde_json::to_string(&ChangeLevel::Medium).unwrap(),
            "\"MEDIUM\""
        );
    }

    #[test]
    fn test_rule_table_order() {
        let names: Vec<_> = TRIGGER_CONDITIONS.iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            vec![
                "claude_md_changed",
                "config_files_changed",
                "structure_changed",
                "modified_files",
                "new_files",
                "deleted_files",
                "source_files_changed",
            ]
        );
    }
}
