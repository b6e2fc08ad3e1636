//! Domain model for users, notes and tags.
//!
//! # Invariants
//! - Every record is identified by a UUID v7, so ids sort by creation time.
//! - Password hashes never leave the process through serialization.

pub mod note;
pub mod page;
pub mod user;

pub use note::{Note, NoteDraft, NoteId, Tag, TagId, TagUsage};
pub use page::{Page, Paged};
pub use user::{User, UserId};

/// Generates a fresh time-ordered identifier.
pub fn new_id() -> uuid::Uuid {
    uuid::Uuid::now_v7()
}
