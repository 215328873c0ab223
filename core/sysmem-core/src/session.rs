//! Session state machine over `session_state.json`.
//!
//! Every operation reloads the document, applies one transition from
//! [`crate::state::transition`], stamps `last_updated` and saves. Nothing is
//! cached between calls, so a failed save leaves no half-applied state behind:
//! the next call sees whatever is on disk.

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use crate::state::{transition, Mode, SessionInfo, SessionState, StateStore};

const COMPONENT: &str = "session";

pub type SessionStore = StateStore<SessionState>;

pub struct SessionStateMachine {
    store: SessionStore,
    error_capacity: usize,
    project_path: Option<String>,
}

impl SessionStateMachine {
    pub fn new(store: SessionStore, error_capacity: usize) -> Self {
        Self {
            store,
            error_capacity,
            project_path: None,
        }
    }

    /// Records `path` on sessions created by this machine.
    pub fn with_project_path(mut self, path: impl Into<String>) -> Self {
        self.project_path = Some(path.into());
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// The persisted session, if any.
    pub fn load(&self) -> Option<SessionState> {
        self.store.load()
    }

    /// Starts a new session, replacing any existing one.
    pub fn create(
        &self,
        mode: Mode,
        chapter: u32,
        token_limit: Option<u32>,
    ) -> Option<SessionState> {
        let mut session = SessionState::new(mode, chapter, Utc::now());
        session.project_path = self.project_path.clone();
        if let Some(limit) = token_limit {
            session.context_state.token_limit = limit;
        }

        if !self.store.save(&session) {
            return None;
        }
        info!(session_id = %session.session_id, mode = %mode, "Session created");
        Some(session)
    }

    pub fn switch_mode(&self, target: Mode, details: BTreeMap<String, Value>) -> bool {
        self.mutate("switch_mode", |session| {
            transition::switch_mode(session, target, details, Utc::now())
        })
    }

    pub fn jump_to_chapter(&self, chapter: u32, force: bool) -> bool {
        self.mutate("jump_to_chapter", |session| {
            transition::jump_to_chapter(session, chapter, force, Utc::now())
        })
    }

    /// Appends to the session's own error list.
    pub fn record_error(&self, message: &str) -> bool {
        let capacity = self.error_capacity;
        self.mutate("record_error", |session| {
            transition::record_error(session, message, capacity, Utc::now())
        })
    }

    pub fn record_compression(&self, chapter: u32) -> bool {
        self.mutate("record_compression", |session| {
            transition::record_compression(session, chapter)
        })
    }

    pub fn info(&self) -> Option<SessionInfo> {
        self.load().map(|session| session.info())
    }

    fn mutate<F>(&self, operation: &str, apply: F) -> bool
    where
        F: FnOnce(&mut SessionState),
    {
        let Some(mut session) = self.store.load() else {
            debug!(component = COMPONENT, operation, "No session to update");
            return false;
        };

        apply(&mut session);
        session.last_updated = Some(Utc::now());

        let saved = self.store.save(&session);
        if saved {
            debug!(
                component = COMPONENT,
                operation,
                mode = %session.mode,
                chapter = session.current_chapter,
                "Session updated"
            );
        }
        saved
    }
}
