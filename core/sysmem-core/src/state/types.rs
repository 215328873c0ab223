//! Serialized session types persisted in `session_state.json`.
//!
//! Only `session_id`, `created_at`, `mode` and `current_chapter` are required;
//! everything else defaults so older or hand-edited files still load.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default context window budget for a new session.
pub const DEFAULT_TOKEN_LIMIT: u32 = 128_000;

/// Section marker written whenever the writer lands on a chapter.
pub const CHAPTER_BEGINNING: &str = "chapter_beginning";

/// Authoring mode of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Setting,
    Writing,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Setting => "setting",
            Mode::Writing => "writing",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "setting" => Ok(Mode::Setting),
            "writing" => Ok(Mode::Writing),
            other => Err(format!("unknown mode '{}' (expected setting|writing)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextState {
    pub token_limit: u32,
    pub compression_enabled: bool,
    pub last_compression_chapter: u32,
}

impl Default for ContextState {
    fn default() -> Self {
        Self {
            token_limit: DEFAULT_TOKEN_LIMIT,
            compression_enabled: true,
            last_compression_chapter: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkingState {
    pub unsaved_changes: bool,
    pub current_section: String,
    pub generation_cache: BTreeMap<String, Value>,
}

impl Default for WorkingState {
    fn default() -> Self {
        Self {
            unsaved_changes: false,
            current_section: "beginning".to_string(),
            generation_cache: BTreeMap::new(),
        }
    }
}

/// One entry of the append-only navigation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NavigationRecord {
    ModeSwitch {
        timestamp: DateTime<Utc>,
        from: Mode,
        to: Mode,
        #[serde(default)]
        details: BTreeMap<String, Value>,
    },
    ChapterJump {
        timestamp: DateTime<Utc>,
        from_chapter: u32,
        to_chapter: u32,
        force: bool,
    },
}

impl NavigationRecord {
    /// The serialized `action` tag.
    pub fn action(&self) -> &'static str {
        match self {
            NavigationRecord::ModeSwitch { .. } => "mode_switch",
            NavigationRecord::ChapterJump { .. } => "chapter_jump",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            NavigationRecord::ModeSwitch { timestamp, .. }
            | NavigationRecord::ChapterJump { timestamp, .. } => *timestamp,
        }
    }
}

/// An error recorded against the session itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionError {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Durable state of one authoring session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    pub mode: Mode,
    pub current_chapter: u32,
    #[serde(default)]
    pub project_path: Option<String>,
    #[serde(default)]
    pub context_state: ContextState,
    #[serde(default)]
    pub working_state: WorkingState,
    #[serde(default)]
    pub navigation_history: Vec<NavigationRecord>,
    #[serde(default)]
    pub error_log: Vec<SessionError>,
}

impl SessionState {
    /// A fresh session with id `session_<unixtime>`.
    pub fn new(mode: Mode, chapter: u32, now: DateTime<Utc>) -> Self {
        Self {
            session_id: format!("session_{}", now.timestamp()),
            created_at: now,
            last_updated: Some(now),
            mode,
            current_chapter: chapter,
            project_path: None,
            context_state: ContextState::default(),
            working_state: WorkingState::default(),
            navigation_history: Vec::new(),
            error_log: Vec::new(),
        }
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            mode: self.mode,
            current_chapter: self.current_chapter,
            created_at: self.created_at,
            last_updated: self.last_updated,
            has_unsaved_changes: self.working_state.unsaved_changes,
            navigation_count: self.navigation_history.len(),
        }
    }
}

/// Summary of a session for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub mode: Mode,
    pub current_chapter: u32,
    pub created_at: DateTime<Utc>,
    pub last_updated: Option<DateTime<Utc>>,
    pub has_unsaved_changes: bool,
    pub navigation_count: usize,
}
