//! Error types for sysmem-core operations.
//!
//! These errors never cross the public contract surface: `StateStore`,
//! `FingerprintGenerator`, `ChangeClassifier` and `SessionStateMachine` turn
//! them into absent values, `false`, or a fail-open report at their boundary.
//! Internal helpers use them so `?` can carry context up to that boundary.

use std::path::PathBuf;

/// All errors that can occur inside sysmem-core.
#[derive(Debug, thiserror::Error)]
pub enum SysmemError {
    // ─────────────────────────────────────────────────────────────────────
    // I/O and Serialization
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Document Validation
    // ─────────────────────────────────────────────────────────────────────
    /// Document parsed as JSON but is missing a required field or has the wrong shape.
    #[error("Schema mismatch in {path}: {details}")]
    Schema { path: PathBuf, details: String },

    /// Document is not valid JSON (truncated write, garbage bytes).
    #[error("Corrupt document {path}: {details}")]
    Corrupt { path: PathBuf, details: String },

    #[error("Configuration file malformed: {path}: {details}")]
    Config { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Classification
    // ─────────────────────────────────────────────────────────────────────
    #[error("Change classification fault: {0}")]
    Classification(String),
}

impl SysmemError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        SysmemError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        SysmemError::Json {
            context: context.into(),
            source,
        }
    }
}

/// Convenience type alias for Results using SysmemError.
pub type Result<T, E = SysmemError> = std::result::Result<T, E>;

impl From<SysmemError> for String {
    fn from(err: SysmemError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display_includes_context() {
        let err = SysmemError::io(
            "writing session_state.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let message = err.to_string();
        assert!(message.contains("writing session_state.json"));
        assert!(message.contains("denied"));
    }

    #[test]
    fn test_schema_error_converts_to_string() {
        let err = SysmemError::Schema {
            path: PathBuf::from("/p/session_state.json"),
            details: "missing field `mode`".to_string(),
        };
        let message: String = err.into();
        assert!(message.starts_with("Schema mismatch in /p/session_state.json"));
    }
}
