//! Note use cases, always scoped to the calling user.
//!
//! # Invariants
//! - Requested tag names are passed through verbatim: no trimming, no case
//!   folding.
//! - Update is a full replacement of fields and tag set.

use crate::context::RequestContext;
use crate::error::CoreResult;
use crate::model::{new_id, Note, NoteDraft, NoteId, Page, Paged, Tag, TagUsage, UserId};
use crate::repo::note_repo::NoteRepository;
use chrono::{DateTime, Utc};
use log::info;

/// Note service facade over repository implementations.
pub struct NoteService<R: NoteRepository> {
    repo: R,
}

impl<R: NoteRepository> NoteService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_note(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
        draft: NoteDraft,
    ) -> CoreResult<Note> {
        let now = Utc::now();
        let note = Note {
            id: new_id(),
            user_id,
            title: draft.title,
            content: draft.content,
            memo_date: draft.memo_date,
            tags: candidate_tags(draft.tag_names, now),
            created_at: now,
            updated_at: now,
        };

        let saved = self.repo.save(&note)?;
        info!(
            "event=note_create module=note_service status=ok {} note_id={} tag_count={}",
            ctx,
            saved.id,
            saved.tags.len()
        );
        Ok(saved)
    }

    pub fn get_notes(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
        page: Page,
    ) -> CoreResult<Paged<Note>> {
        let notes = self.repo.get_notes(user_id, page)?;
        info!(
            "event=note_list module=note_service status=ok {} page={} returned={} total={}",
            ctx,
            page.page,
            notes.items.len(),
            notes.total_count
        );
        Ok(notes)
    }

    /// Unknown tag names yield `(0, [])`.
    pub fn get_notes_by_tag(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
        tag_name: &str,
        page: Page,
    ) -> CoreResult<Paged<Note>> {
        let notes = self.repo.get_notes_by_tag(user_id, tag_name, page)?;
        info!(
            "event=note_list module=note_service status=ok {} filter=tag page={} returned={} total={}",
            ctx,
            page.page,
            notes.items.len(),
            notes.total_count
        );
        Ok(notes)
    }

    pub fn find_by_id(&self, _ctx: &RequestContext, user_id: UserId, id: NoteId) -> CoreResult<Note> {
        Ok(self.repo.find_by_id(user_id, id)?)
    }

    pub fn update_note(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
        id: NoteId,
        draft: NoteDraft,
    ) -> CoreResult<Note> {
        let mut note = self.repo.find_by_id(user_id, id)?;
        let now = Utc::now();
        note.title = draft.title;
        note.content = draft.content;
        note.memo_date = draft.memo_date;
        note.tags = candidate_tags(draft.tag_names, now);
        note.updated_at = now;

        let updated = self.repo.update(&note)?;
        info!(
            "event=note_update module=note_service status=ok {} note_id={} tag_count={}",
            ctx,
            updated.id,
            updated.tags.len()
        );
        Ok(updated)
    }

    pub fn delete_note(&self, ctx: &RequestContext, user_id: UserId, id: NoteId) -> CoreResult<()> {
        self.repo.delete(user_id, id)?;
        info!(
            "event=note_delete module=note_service status=ok {} note_id={}",
            ctx, id
        );
        Ok(())
    }

    pub fn list_tags(&self, _ctx: &RequestContext, user_id: UserId) -> CoreResult<Vec<TagUsage>> {
        Ok(self.repo.list_tags(user_id)?)
    }
}

/// Fresh tag rows for each requested name; the repository swaps in stored
/// rows where the name already exists.
fn candidate_tags(names: Vec<String>, now: DateTime<Utc>) -> Vec<Tag> {
    names
        .into_iter()
        .map(|name| Tag {
            id: new_id(),
            name,
            created_at: now,
            updated_at: now,
        })
        .collect()
}
