//! Note and tag records.
//!
//! # Invariants
//! - A note is owned by exactly one user; reads and writes are scoped by
//!   `user_id`.
//! - Tag names are a shared, case-sensitive vocabulary: `"Go"` and `"go"`
//!   are different tags and neither is trimmed.

use crate::model::UserId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub type NoteId = Uuid;
pub type TagId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Note with its tags eagerly attached, sorted by tag name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    pub id: NoteId,
    pub user_id: UserId,
    pub title: String,
    pub content: String,
    pub memo_date: String,
    pub tags: Vec<Tag>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|tag| tag.name.as_str()).collect()
    }
}

/// Caller-supplied note fields for create and full-replace update.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub memo_date: String,
    pub tag_names: Vec<String>,
}

/// Tag vocabulary entry with the number of notes referencing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagUsage {
    pub name: String,
    pub note_count: u64,
}
