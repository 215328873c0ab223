//! Persisted state: the generic document store and the session document.
//!
//! # Module Structure
//!
//! - [`store`]: Load/save/backup-rotate for one JSON document slot
//! - [`types`]: Session document types (`session_state.json`)
//! - [`transition`]: Pure session transitions applied before each save

mod store;
pub mod transition;
pub(crate) mod types;

pub use store::{Slot, StateStore};
pub use types::{
    ContextState, Mode, NavigationRecord, SessionError, SessionInfo, SessionState, WorkingState,
    CHAPTER_BEGINNING, DEFAULT_TOKEN_LIMIT,
};
