//! Project fingerprints: structural snapshots of a code tree.
//!
//! A single directory walk produces one [`Fingerprint`] with four projections
//! besides the content digests:
//!
//! - the marker document (`CLAUDE.md` by default) at the root
//! - root-level build/config files
//! - directory topology
//! - primary source files
//!
//! Hidden entries, build/cache directories and sysmem's own documents
//! (`ScanConfig::exclude_paths`) are never entered. Symlinks to files are
//! hashed as the file they point to; other symlinks are not followed. A file
//! that cannot be read, or whose path is not UTF-8, is left out of the digests
//! and reported to the error log; the scan itself always completes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::config::ScanConfig;
use crate::error_log::ErrorLog;
use crate::state::StateStore;

const COMPONENT: &str = "fingerprint";

/// Persistence for the previous snapshot.
pub type FingerprintStore = StateStore<Fingerprint>;

/// Structural snapshot of a project at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Absolute path of the scanned tree.
    pub root_path: String,
    pub scanned_at: DateTime<Utc>,
    /// Root-relative path (`/`-separated) → MD5 hex digest.
    pub file_hashes: BTreeMap<String, String>,
    pub claude_md_exists: bool,
    /// Seconds since the epoch; `0.0` when the marker is absent.
    pub claude_md_mtime: f64,
    pub config_files: BTreeSet<String>,
    pub dir_structure: BTreeSet<String>,
    pub total_files: u64,
    #[serde(alias = "python_files")]
    pub source_files: BTreeSet<String>,
}

impl Fingerprint {
    /// Checks `total_files == |file_hashes|`.
    pub fn is_consistent(&self) -> bool {
        self.total_files == self.file_hashes.len() as u64
    }
}

/// Walks project trees and produces fingerprints.
#[derive(Debug, Clone)]
pub struct FingerprintGenerator {
    scan: ScanConfig,
    errors: ErrorLog,
}

impl FingerprintGenerator {
    pub fn new(scan: ScanConfig, errors: ErrorLog) -> Self {
        Self { scan, errors }
    }

    /// Scans the tree rooted at `root`.
    pub fn generate(&self, root: &Path) -> Fingerprint {
        let root = resolve_root(root);

        let mut file_hashes = BTreeMap::new();
        let mut config_files = BTreeSet::new();
        let mut dir_structure = BTreeSet::new();
        let mut source_files = BTreeSet::new();
        let mut claude_md_exists = false;
        let mut claude_md_mtime = 0.0;

        let walker = WalkDir::new(&root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || self.admit(&root, entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    self.errors
                        .log(COMPONENT, &format!("Skipping unreadable entry: {}", err));
                    continue;
                }
            };
            let Some(relative) = relative_key(&root, entry.path()) else {
                continue;
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                dir_structure.insert(relative);
                continue;
            }
            // File symlinks count as the file they point to; others are not followed.
            if file_type.is_symlink() {
                if !entry.path().is_file() {
                    debug!(path = %entry.path().display(), "Not following symlink");
                    continue;
                }
            } else if !file_type.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if entry.depth() == 1 {
                if name == self.scan.marker_file.as_str() {
                    claude_md_exists = true;
                    claude_md_mtime = modified_secs(entry.path()).unwrap_or(0.0);
                }
                if self.is_config_file(&name) {
                    config_files.insert(relative.clone());
                }
            }
            if self.is_source_file(entry.path()) {
                source_files.insert(relative.clone());
            }

            match digest_file(entry.path()) {
                Ok(digest) => {
                    file_hashes.insert(relative, digest);
                }
                Err(err) => self.errors.log(
                    COMPONENT,
                    &format!("Skipping unreadable file {}: {}", entry.path().display(), err),
                ),
            }
        }

        let total_files = file_hashes.len() as u64;
        debug!(
            root = %root.display(),
            files = total_files,
            dirs = dir_structure.len(),
            "Fingerprint generated"
        );

        Fingerprint {
            root_path: root.to_string_lossy().to_string(),
            scanned_at: Utc::now(),
            file_hashes,
            claude_md_exists,
            claude_md_mtime,
            config_files,
            dir_structure,
            total_files,
            source_files,
        }
    }

    /// Whether the walk yields (and descends into) `entry`.
    fn admit(&self, root: &Path, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            return false;
        }
        if entry.file_type().is_dir() && self.scan.skip_dirs.iter().any(|d| *d == *name) {
            return false;
        }
        match relative_key(root, entry.path()) {
            Some(relative) => !self.scan.exclude_paths.contains(&relative),
            None => {
                self.errors.log(
                    COMPONENT,
                    &format!("Skipping non-UTF-8 path {}", entry.path().display()),
                );
                false
            }
        }
    }

    fn is_config_file(&self, name: &str) -> bool {
        if self.scan.config_names.iter().any(|n| n == name) {
            return true;
        }
        extension_of(Path::new(name))
            .is_some_and(|ext| self.scan.config_extensions.iter().any(|e| *e == ext))
    }

    fn is_source_file(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.scan.source_extensions.iter().any(|e| *e == ext))
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Root-relative key with `/` separators regardless of platform.
///
/// `None` for the root itself and for paths that are not valid UTF-8.
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            parts.push(part.to_str()?);
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn modified_secs(path: &Path) -> Option<f64> {
    let modified = fs_err::metadata(path).ok()?.modified().ok()?;
    Some(modified.duration_since(UNIX_EPOCH).ok()?.as_secs_f64())
}

/// MD5 hex digest of a file's contents, streamed.
pub fn digest_file(path: &Path) -> std::io::Result<String> {
    let mut file = fs_err::File::open(path)?;
    let mut context = md5::Context::new();
    std::io::copy(&mut file, &mut context)?;
    Ok(format!("{:x}", context.compute()))
}

/// Absolute form of `root` as recorded in fingerprints.
pub fn resolve_root(root: &Path) -> PathBuf {
    fs_err::canonicalize(root).unwrap_or_else(|_| root.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent).unwrap();
        }
        fs_err::write(path, content).unwrap();
    }

    fn sample_project() -> TempDir {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write(root, "CLAUDE.md", "# project");
        write(root, "package.json", "{}");
        write(root, "ci.yml", "on: push");
        write(root, "src/app.py", "print('hi')");
        write(root, "src/lib/util.py", "x = 1");
        write(root, "src/package.json", "{}");
        write(root, "docs/guide.md", "hello");
        write(root, ".env", "SECRET=1");
        write(root, ".git/config", "[core]");
        write(root, "node_modules/dep/index.js", "module.exports = 1");
        write(root, "src/__pycache__/app.cpython-311.pyc", "bytes");
        temp
    }

    fn generator() -> FingerprintGenerator {
        FingerprintGenerator::new(ScanConfig::default(), ErrorLog::disabled())
    }

    #[test]
    fn test_generate_hashes_visible_files_only() {
        let project = sample_project();
        let fp = generator().generate(project.path());

        let keys: Vec<&str> = fp.file_hashes.keys().map(|k| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "CLAUDE.md",
                "ci.yml",
                "docs/guide.md",
                "package.json",
                "src/app.py",
                "src/lib/util.py",
                "src/package.json",
            ]
        );
        assert_eq!(fp.total_files, 7);
        assert!(fp.is_consistent());
    }

    #[test]
    fn test_generate_records_md5_digest() {
        let project = sample_project();
        let fp = generator().generate(project.path());
        assert_eq!(
            fp.file_hashes.get("docs/guide.md").map(String::as_str),
            Some("5d41402abc4b2a76b9719d911017c592")
        );
    }

    #[test]
    fn test_generate_projects_marker_config_dirs_and_sources() {
        let project = sample_project();
        let fp = generator().generate(project.path());

        assert!(fp.claude_md_exists);
        assert!(fp.claude_md_mtime > 0.0);

        let configs: Vec<&str> = fp.config_files.iter().map(|s| s.as_str()).collect();
        assert_eq!(configs, vec!["ci.yml", "package.json"]);

        let dirs: Vec<&str> = fp.dir_structure.iter().map(|s| s.as_str()).collect();
        assert_eq!(dirs, vec!["docs", "src", "src/lib"]);

        let sources: Vec<&str> = fp.source_files.iter().map(|s| s.as_str()).collect();
        assert_eq!(sources, vec!["src/app.py", "src/lib/util.py"]);
    }

    #[test]
    fn test_generate_without_marker() {
        let temp = tempdir().unwrap();
        write(temp.path(), "main.py", "pass");
        let fp = generator().generate(temp.path());

        assert!(!fp.claude_md_exists);
        assert_eq!(fp.claude_md_mtime, 0.0);
        assert!(fp.dir_structure.is_empty());
    }

    #[test]
    fn test_generate_records_absolute_root() {
        let project = sample_project();
        let fp = generator().generate(project.path());
        assert_eq!(
            PathBuf::from(&fp.root_path),
            resolve_root(project.path())
        );
        assert!(Path::new(&fp.root_path).is_absolute());
    }

    #[test]
    fn test_generate_is_stable_across_scans() {
        let project = sample_project();
        let gen = generator();
        let first = gen.generate(project.path());
        let second = gen.generate(project.path());

        assert_eq!(first.file_hashes, second.file_hashes);
        assert_eq!(first.dir_structure, second.dir_structure);
        assert_eq!(first.claude_md_mtime, second.claude_md_mtime);
    }

    #[test]
    fn test_generate_missing_root_yields_empty_fingerprint() {
        let temp = tempdir().unwrap();
        let fp = generator().generate(&temp.path().join("missing"));
        assert_eq!(fp.total_files, 0);
        assert!(fp.file_hashes.is_empty());
    }

    #[test]
    fn test_custom_scan_config_changes_projections() {
        let temp = tempdir().unwrap();
        write(temp.path(), "AGENTS.md", "marker");
        write(temp.path(), "src/main.rs", "fn main() {}");
        write(temp.path(), "vendor/lib.rs", "");
        let scan = ScanConfig {
            marker_file: "AGENTS.md".to_string(),
            source_extensions: vec!["rs".to_string()],
            skip_dirs: vec!["vendor".to_string()],
            ..ScanConfig::default()
        };
        let fp = FingerprintGenerator::new(scan, ErrorLog::disabled()).generate(temp.path());

        assert!(fp.claude_md_exists);
        assert_eq!(fp.source_files.len(), 1);
        assert!(!fp.dir_structure.contains("vendor"));
    }

    fn logging_generator(dir: &Path) -> (FingerprintGenerator, ErrorLog) {
        let errors = ErrorLog::new(dir.join("error_log.json"), 100);
        (
            FingerprintGenerator::new(ScanConfig::default(), errors.clone()),
            errors,
        )
    }

    #[test]
    fn test_own_documents_are_not_scanned() {
        let project = sample_project();
        write(project.path(), "session_state.json", "{}");
        write(project.path(), "system/error_log.json", "[]");
        write(project.path(), "system/session_backup_1.json", "{}");

        let fp = generator().generate(project.path());
        assert!(!fp.file_hashes.contains_key("session_state.json"));
        assert!(!fp.dir_structure.contains("system"));
        assert_eq!(fp.total_files, 7);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_is_skipped_and_logged() {
        use std::os::unix::fs::PermissionsExt;

        let project = sample_project();
        let locked = project.path().join("docs/guide.md");
        fs_err::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        if fs_err::read(&locked).is_ok() {
            // Permission bits are not enforced (running as root).
            return;
        }

        let logs = tempdir().unwrap();
        let (generator, errors) = logging_generator(logs.path());
        let fp = generator.generate(project.path());
        fs_err::set_permissions(&locked, std::fs::Permissions::from_mode(0o644)).unwrap();

        assert!(!fp.file_hashes.contains_key("docs/guide.md"));
        assert!(fp.file_hashes.contains_key("src/app.py"));
        assert_eq!(fp.total_files, 6);
        assert!(fp.is_consistent());
        let entries = errors.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].component, "fingerprint");
    }

    #[cfg(unix)]
    #[test]
    fn test_file_symlink_is_hashed_as_target() {
        let project = sample_project();
        std::os::unix::fs::symlink(
            project.path().join("docs/guide.md"),
            project.path().join("docs/alias.md"),
        )
        .unwrap();
        std::os::unix::fs::symlink(project.path().join("src"), project.path().join("src_link"))
            .unwrap();

        let fp = generator().generate(project.path());
        assert_eq!(
            fp.file_hashes.get("docs/alias.md"),
            fp.file_hashes.get("docs/guide.md")
        );
        assert!(!fp.dir_structure.contains("src_link"));
        assert!(!fp.file_hashes.keys().any(|k| k.starts_with("src_link")));
        assert!(fp.is_consistent());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_path_is_skipped_and_logged() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let project = sample_project();
        let odd = project.path().join(OsStr::from_bytes(b"notes\xff.txt"));
        fs_err::write(&odd, "bytes").unwrap();

        let logs = tempdir().unwrap();
        let (generator, errors) = logging_generator(logs.path());
        let fp = generator.generate(project.path());

        assert_eq!(fp.total_files, 7);
        assert!(fp.file_hashes.keys().all(|k| !k.starts_with("notes")));
        let entries = errors.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].message.starts_with("Skipping non-UTF-8 path"));
    }

    #[test]
    fn test_legacy_python_files_key_is_accepted() {
        let json = r#"{
            "root_path": "/p",
            "scanned_at": "2025-01-01T00:00:00Z",
            "file_hashes": {"a.py": "x"},
            "claude_md_exists": false,
            "claude_md_mtime": 0.0,
            "config_files": [],
            "dir_structure": [],
            "total_files": 1,
            "python_files": ["a.py"]
        }"#;
        let fp: Fingerprint = serde_json::from_str(json).unwrap();
        assert!(fp.source_files.contains("a.py"));
    }
}
