//! Session transitions.
//!
//! The machine is permissive: every transition is accepted from every state.
//! Each one appends exactly one navigation record so the history is a complete
//! audit of how the session moved.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::types::{Mode, NavigationRecord, SessionError, SessionState, CHAPTER_BEGINNING};

pub fn switch_mode(
    session: &mut SessionState,
    target: Mode,
    details: BTreeMap<String, Value>,
    now: DateTime<Utc>,
) {
    let from = session.mode;
    session.mode = target;
    session.navigation_history.push(NavigationRecord::ModeSwitch {
        timestamp: now,
        from,
        to: target,
        details,
    });

    match (from, target) {
        (Mode::Setting, Mode::Writing) => {
            session.current_chapter = 1;
            session.working_state.current_section = CHAPTER_BEGINNING.to_string();
        }
        // Position is kept; the writer has work in flight.
        (Mode::Writing, Mode::Setting) => {
            session.working_state.unsaved_changes = true;
        }
        _ => {}
    }
}

/// `force` is recorded as caller intent only; jumps are never rejected.
pub fn jump_to_chapter(session: &mut SessionState, chapter: u32, force: bool, now: DateTime<Utc>) {
    session.navigation_history.push(NavigationRecord::ChapterJump {
        timestamp: now,
        from_chapter: session.current_chapter,
        to_chapter: chapter,
        force,
    });
    session.current_chapter = chapter;
    session.working_state.current_section = CHAPTER_BEGINNING.to_string();
    session.working_state.unsaved_changes = false;
}

/// Appends to the session's error ring, dropping the oldest beyond `capacity`.
pub fn record_error(session: &mut SessionState, message: &str, capacity: usize, now: DateTime<Utc>) {
    session.error_log.push(SessionError {
        timestamp: now,
        message: message.to_string(),
    });
    if session.error_log.len() > capacity {
        let excess = session.error_log.len() - capacity;
        session.error_log.drain(..excess);
    }
}

pub fn record_compression(session: &mut SessionState, chapter: u32) {
    session.context_state.last_compression_chapter = chapter;
}
