//! HTTP collaborator surfaces
//!
//! Thin JSON seams around the pipeline: producer submission/revocation,
//! the conflict surface the admin UI consumes, the unlock operation, and
//! dead-letter inspection. The admin UI itself lives elsewhere.

mod conflicts;
mod dead_letters;
mod health;
mod matches;
mod messages;

pub use conflicts::{list_conflicts, resolve_conflict};
pub use dead_letters::list_dead_letters;
pub use health::health;
pub use matches::{get_match, unlock_match};
pub use messages::{revoke_message, submit_message};
