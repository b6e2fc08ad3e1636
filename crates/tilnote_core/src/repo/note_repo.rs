//! Note/tag repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist notes scoped to their owning user.
//! - Own tag resolution (reuse-by-name or create) and orphan-tag cleanup.
//!
//! # Invariants
//! - Every note query filters on both `id` and `user_id`; a note owned by
//!   someone else is indistinguishable from a missing one.
//! - Tag matching is exact, case-sensitive name equality. `tags.name` is
//!   UNIQUE, so the first (only) match wins.
//! - After any write that removes tag links, no tag row is left without a
//!   referencing note.
//! - Update replaces the full tag set: clear links, drop orphans, resolve the
//!   requested names, relink.

use crate::model::{Note, NoteId, Page, Paged, Tag, TagUsage, UserId};
use crate::repo::{
    conflict_or_db, count_to_u64, from_millis, parse_uuid, to_millis, to_sql_int, RepoError,
    RepoResult,
};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::collections::HashMap;

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    title,
    content,
    memo_date,
    created_at,
    updated_at
FROM notes";

const TAG_SELECT_SQL: &str = "SELECT id, name, created_at, updated_at FROM tags";

/// Repository interface for notes and their tags.
pub trait NoteRepository {
    /// Lists one page of the user's notes, newest first, tags attached.
    fn get_notes(&self, user_id: UserId, page: Page) -> RepoResult<Paged<Note>>;
    /// Lists the user's notes linked to the tag named exactly `tag_name`.
    ///
    /// An unknown tag yields an empty page, not an error.
    fn get_notes_by_tag(
        &self,
        user_id: UserId,
        tag_name: &str,
        page: Page,
    ) -> RepoResult<Paged<Note>>;
    fn find_by_id(&self, user_id: UserId, id: NoteId) -> RepoResult<Note>;
    /// Inserts `note`. Candidate tags in `note.tags` are replaced by existing
    /// rows with the same name; the rest are inserted as given.
    fn save(&self, note: &Note) -> RepoResult<Note>;
    /// Replaces title, content, memo date, `updated_at` and the tag set.
    fn update(&self, note: &Note) -> RepoResult<Note>;
    fn delete(&self, user_id: UserId, id: NoteId) -> RepoResult<()>;
    /// Tags used by the user's notes with per-user note counts.
    fn list_tags(&self, user_id: UserId) -> RepoResult<Vec<TagUsage>>;
}

/// SQLite-backed notes/tags repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn begin(&self) -> RepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn get_notes(&self, user_id: UserId, page: Page) -> RepoResult<Paged<Note>> {
        let user_text = user_id.to_string();
        let total: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM notes WHERE user_id = ?1;",
            [user_text.as_str()],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL}
             WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2 OFFSET ?3;"
        ))?;
        let rows = stmt
            .query_map(
                params![
                    user_text,
                    to_sql_int(page.limit()),
                    to_sql_int(page.offset())
                ],
                read_note_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Paged {
            total_count: count_to_u64(total),
            items: attach_tags(self.conn, rows)?,
        })
    }

    fn get_notes_by_tag(
        &self,
        user_id: UserId,
        tag_name: &str,
        page: Page,
    ) -> RepoResult<Paged<Note>> {
        let Some(tag) = find_tag_by_name(self.conn, tag_name)? else {
            return Ok(Paged::empty());
        };

        let user_text = user_id.to_string();
        let tag_text = tag.id.to_string();
        let total: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM notes n
             INNER JOIN note_tags nt ON nt.note_id = n.id
             WHERE n.user_id = ?1
               AND nt.tag_id = ?2;",
            params![user_text, tag_text],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL}
             WHERE user_id = ?1
               AND EXISTS (
                   SELECT 1
                   FROM note_tags nt
                   WHERE nt.note_id = notes.id
                     AND nt.tag_id = ?2
               )
             ORDER BY created_at DESC, id DESC
             LIMIT ?3 OFFSET ?4;"
        ))?;
        let rows = stmt
            .query_map(
                params![
                    user_text,
                    tag_text,
                    to_sql_int(page.limit()),
                    to_sql_int(page.offset())
                ],
                read_note_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Paged {
            total_count: count_to_u64(total),
            items: attach_tags(self.conn, rows)?,
        })
    }

    fn find_by_id(&self, user_id: UserId, id: NoteId) -> RepoResult<Note> {
        load_note(self.conn, user_id, id)
    }

    fn save(&self, note: &Note) -> RepoResult<Note> {
        let tx = self.begin()?;
        let note_text = note.id.to_string();
        tx.execute(
            "INSERT INTO notes (
                id,
                user_id,
                title,
                content,
                memo_date,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                note_text,
                note.user_id.to_string(),
                note.title.as_str(),
                note.content.as_str(),
                note.memo_date.as_str(),
                to_millis(note.created_at),
                to_millis(note.updated_at),
            ],
        )
        .map_err(|err| conflict_or_db(err, "note", note_text.as_str()))?;

        link_tags(&tx, note_text.as_str(), &note.tags)?;
        let saved = load_note(&tx, note.user_id, note.id)?;
        tx.commit()?;
        Ok(saved)
    }

    fn update(&self, note: &Note) -> RepoResult<Note> {
        let tx = self.begin()?;
        let note_text = note.id.to_string();
        if !note_exists(&tx, note.user_id, note_text.as_str())? {
            return Err(RepoError::not_found("note", note.id));
        }

        clear_links(&tx, note_text.as_str())?;
        delete_orphan_tags(&tx)?;

        tx.execute(
            "UPDATE notes
             SET
                title = ?3,
                content = ?4,
                memo_date = ?5,
                updated_at = ?6
             WHERE id = ?1
               AND user_id = ?2;",
            params![
                note_text,
                note.user_id.to_string(),
                note.title.as_str(),
                note.content.as_str(),
                note.memo_date.as_str(),
                to_millis(note.updated_at),
            ],
        )?;
        link_tags(&tx, note_text.as_str(), &note.tags)?;

        let updated = load_note(&tx, note.user_id, note.id)?;
        tx.commit()?;
        Ok(updated)
    }

    fn delete(&self, user_id: UserId, id: NoteId) -> RepoResult<()> {
        let tx = self.begin()?;
        let note_text = id.to_string();
        if !note_exists(&tx, user_id, note_text.as_str())? {
            return Err(RepoError::not_found("note", id));
        }

        clear_links(&tx, note_text.as_str())?;
        delete_orphan_tags(&tx)?;
        tx.execute(
            "DELETE FROM notes WHERE id = ?1 AND user_id = ?2;",
            params![note_text, user_id.to_string()],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn list_tags(&self, user_id: UserId) -> RepoResult<Vec<TagUsage>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.name, COUNT(nt.note_id)
             FROM tags t
             INNER JOIN note_tags nt ON nt.tag_id = t.id
             INNER JOIN notes n ON n.id = nt.note_id
             WHERE n.user_id = ?1
             GROUP BY t.id, t.name
             ORDER BY t.name ASC;",
        )?;
        let mut rows = stmt.query([user_id.to_string()])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(TagUsage {
                name: row.get(0)?,
                note_count: count_to_u64(row.get(1)?),
            });
        }
        Ok(tags)
    }
}

/// Deletes every tag no note links to. Returns the number of rows removed.
///
/// Runs on whatever connection or transaction it is handed, so callers fold
/// it into their own unit of work.
pub fn delete_orphan_tags(conn: &Connection) -> RepoResult<usize> {
    let removed = conn.execute(
        "DELETE FROM tags
         WHERE NOT EXISTS (
             SELECT 1
             FROM note_tags nt
             WHERE nt.tag_id = tags.id
         );",
        [],
    )?;
    if removed > 0 {
        debug!("event=orphan_tags_deleted module=repo status=ok count={removed}");
    }
    Ok(removed)
}

fn find_tag_by_name(conn: &Connection, name: &str) -> RepoResult<Option<Tag>> {
    let row = conn
        .query_row(
            &format!("{TAG_SELECT_SQL} WHERE name = ?1 LIMIT 1;"),
            [name],
            read_tag_row,
        )
        .optional()?;
    row.map(TagRow::into_tag).transpose()
}

/// Reuses the stored tag with the candidate's name, or inserts the candidate.
fn resolve_tag(tx: &Transaction<'_>, candidate: &Tag) -> RepoResult<Tag> {
    if let Some(existing) = find_tag_by_name(tx, candidate.name.as_str())? {
        return Ok(existing);
    }

    tx.execute(
        "INSERT INTO tags (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4);",
        params![
            candidate.id.to_string(),
            candidate.name.as_str(),
            to_millis(candidate.created_at),
            to_millis(candidate.updated_at),
        ],
    )
    .map_err(|err| conflict_or_db(err, "tag", candidate.name.as_str()))?;
    Ok(candidate.clone())
}

fn link_tags(tx: &Transaction<'_>, note_id: &str, candidates: &[Tag]) -> RepoResult<()> {
    for candidate in candidates {
        let tag = resolve_tag(tx, candidate)?;
        // Repeated names in one request collapse onto the same link.
        tx.execute(
            "INSERT OR IGNORE INTO note_tags (note_id, tag_id) VALUES (?1, ?2);",
            params![note_id, tag.id.to_string()],
        )?;
    }
    Ok(())
}

fn clear_links(tx: &Transaction<'_>, note_id: &str) -> RepoResult<()> {
    tx.execute("DELETE FROM note_tags WHERE note_id = ?1;", [note_id])?;
    Ok(())
}

fn note_exists(conn: &Connection, user_id: UserId, note_id: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM notes
            WHERE id = ?1
              AND user_id = ?2
        );",
        params![note_id, user_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn load_note(conn: &Connection, user_id: UserId, id: NoteId) -> RepoResult<Note> {
    let row = conn
        .query_row(
            &format!("{NOTE_SELECT_SQL} WHERE id = ?1 AND user_id = ?2;"),
            params![id.to_string(), user_id.to_string()],
            read_note_row,
        )
        .optional()?;
    let Some(row) = row else {
        return Err(RepoError::not_found("note", id));
    };

    attach_tags(conn, vec![row])?
        .pop()
        .ok_or_else(|| RepoError::not_found("note", id))
}

/// Loads tags for all rows in one query and builds the notes.
fn attach_tags(conn: &Connection, rows: Vec<NoteRow>) -> RepoResult<Vec<Note>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; rows.len()].join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT nt.note_id, t.id, t.name, t.created_at, t.updated_at
         FROM note_tags nt
         INNER JOIN tags t ON t.id = nt.tag_id
         WHERE nt.note_id IN ({placeholders})
         ORDER BY t.name ASC;"
    ))?;
    let bind_values: Vec<Value> = rows.iter().map(|row| Value::Text(row.id.clone())).collect();
    let mut tag_rows = stmt.query(params_from_iter(bind_values))?;

    let mut tags_by_note: HashMap<String, Vec<Tag>> = HashMap::new();
    while let Some(row) = tag_rows.next()? {
        let note_id: String = row.get(0)?;
        let tag = TagRow {
            id: row.get(1)?,
            name: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        }
        .into_tag()?;
        tags_by_note.entry(note_id).or_default().push(tag);
    }

    rows.into_iter()
        .map(|row| {
            let tags = tags_by_note.remove(&row.id).unwrap_or_default();
            row.into_note(tags)
        })
        .collect()
}

struct NoteRow {
    id: String,
    user_id: String,
    title: String,
    content: String,
    memo_date: String,
    created_at: i64,
    updated_at: i64,
}

impl NoteRow {
    fn into_note(self, tags: Vec<Tag>) -> RepoResult<Note> {
        Ok(Note {
            id: parse_uuid(&self.id, "notes.id")?,
            user_id: parse_uuid(&self.user_id, "notes.user_id")?,
            title: self.title,
            content: self.content,
            memo_date: self.memo_date,
            tags,
            created_at: from_millis(self.created_at, "notes.created_at")?,
            updated_at: from_millis(self.updated_at, "notes.updated_at")?,
        })
    }
}

fn read_note_row(row: &Row<'_>) -> rusqlite::Result<NoteRow> {
    Ok(NoteRow {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        content: row.get("content")?,
        memo_date: row.get("memo_date")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

struct TagRow {
    id: String,
    name: String,
    created_at: i64,
    updated_at: i64,
}

impl TagRow {
    fn into_tag(self) -> RepoResult<Tag> {
        Ok(Tag {
            id: parse_uuid(&self.id, "tags.id")?,
            name: self.name,
            created_at: from_millis(self.created_at, "tags.created_at")?,
            updated_at: from_millis(self.updated_at, "tags.updated_at")?,
        })
    }
}

fn read_tag_row(row: &Row<'_>) -> rusqlite::Result<TagRow> {
    Ok(TagRow {
        id: row.get("id")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
