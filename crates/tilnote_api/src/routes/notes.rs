//! `/notes` and `/tags` endpoints. Every route requires a `USER` token and
//! only ever sees the caller's own notes.

use crate::auth::UserAuth;
use crate::error::ApiError;
use crate::extract::{ValidJson, ValidPath, ValidQuery};
use crate::state::AppState;
use crate::validation::{page_from_query, Validator, TITLE_LEN};
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tilnote_core::{
    CoreResult, Note, NoteDraft, NoteId, NoteService, RequestContext, SqliteNoteRepository,
    TagUsage,
};

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub title: String,
    pub content: String,
    pub memo_date: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NoteRequest {
    fn validate(&self) -> CoreResult<()> {
        let mut check = Validator::new();
        check.length("title", &self.title, TITLE_LEN);
        check.not_empty("content", &self.content);
        check.memo_date("memo_date", &self.memo_date);
        check.tags("tags", &self.tags);
        check.finish()
    }

    fn into_draft(self) -> NoteDraft {
        NoteDraft {
            title: self.title,
            content: self.content,
            memo_date: self.memo_date,
            tag_names: self.tags,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NotesQuery {
    pub page: Option<u32>,
    pub items_per_page: Option<u32>,
    pub tag_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NotesPage {
    pub total_count: u64,
    pub page: u32,
    pub notes: Vec<Note>,
}

fn note_service(conn: &rusqlite::Connection) -> NoteService<SqliteNoteRepository<'_>> {
    NoteService::new(SqliteNoteRepository::new(conn))
}

pub async fn create_note(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    UserAuth(current): UserAuth,
    ValidJson(body): ValidJson<NoteRequest>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    body.validate()?;
    let ctx = ctx.with_user(current.id);
    let draft = body.into_draft();
    let note = state
        .run_blocking(move |conn, _| note_service(conn).create_note(&ctx, current.id, draft))
        .await?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn get_notes(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    UserAuth(current): UserAuth,
    ValidQuery(query): ValidQuery<NotesQuery>,
) -> Result<Json<NotesPage>, ApiError> {
    let page = page_from_query(query.page, query.items_per_page)?;
    let ctx = ctx.with_user(current.id);
    let notes = state
        .run_blocking(move |conn, _| {
            let service = note_service(conn);
            match query.tag_name.as_deref() {
                Some(tag_name) => service.get_notes_by_tag(&ctx, current.id, tag_name, page),
                None => service.get_notes(&ctx, current.id, page),
            }
        })
        .await?;
    Ok(Json(NotesPage {
        total_count: notes.total_count,
        page: page.page,
        notes: notes.items,
    }))
}

pub async fn get_note(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    UserAuth(current): UserAuth,
    ValidPath(id): ValidPath<NoteId>,
) -> Result<Json<Note>, ApiError> {
    let ctx = ctx.with_user(current.id);
    let note = state
        .run_blocking(move |conn, _| note_service(conn).find_by_id(&ctx, current.id, id))
        .await?;
    Ok(Json(note))
}

pub async fn update_note(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    UserAuth(current): UserAuth,
    ValidPath(id): ValidPath<NoteId>,
    ValidJson(body): ValidJson<NoteRequest>,
) -> Result<Json<Note>, ApiError> {
    body.validate()?;
    let ctx = ctx.with_user(current.id);
    let draft = body.into_draft();
    let note = state
        .run_blocking(move |conn, _| note_service(conn).update_note(&ctx, current.id, id, draft))
        .await?;
    Ok(Json(note))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    UserAuth(current): UserAuth,
    ValidPath(id): ValidPath<NoteId>,
) -> Result<StatusCode, ApiError> {
    let ctx = ctx.with_user(current.id);
    state
        .run_blocking(move |conn, _| note_service(conn).delete_note(&ctx, current.id, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_tags(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    UserAuth(current): UserAuth,
) -> Result<Json<Vec<TagUsage>>, ApiError> {
    let ctx = ctx.with_user(current.id);
    let tags = state
        .run_blocking(move |conn, _| note_service(conn).list_tags(&ctx, current.id))
        .await?;
    Ok(Json(tags))
}
