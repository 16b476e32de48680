//! Local storage collaborators.
//!
//! The core only produces values; these types decide where they land:
//! one gzip document per instance, a SQLite action log shared by all
//! instances, and small JSON files for per-user session data.

mod action_log;
mod documents;
mod session;

pub use action_log::ActionLog;
pub use documents::DocumentStore;
pub use session::{SessionData, SessionStore};
