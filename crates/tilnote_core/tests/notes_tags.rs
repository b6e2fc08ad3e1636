use chrono::Utc;
use rusqlite::{params, Connection};
use tilnote_core::db::open_db_in_memory;
use tilnote_core::model::new_id;
use tilnote_core::{
    CoreError, NoteDraft, NoteService, Page, RequestContext, SqliteNoteRepository,
    SqliteUserRepository, User, UserId, UserRepository,
};

fn insert_user(conn: &Connection, email: &str) -> UserId {
    let now = Utc::now();
    let user = User {
        id: new_id(),
        name: "tester".to_string(),
        email: email.to_string(),
        password: "not-a-real-hash".to_string(),
        memo: None,
        created_at: now,
        updated_at: now,
    };
    SqliteUserRepository::new(conn).save(&user).unwrap();
    user.id
}

fn draft(title: &str, tags: &[&str]) -> NoteDraft {
    NoteDraft {
        title: title.to_string(),
        content: format!("{title} body"),
        memo_date: "20240315".to_string(),
        tag_names: tags.iter().map(|tag| tag.to_string()).collect(),
    }
}

fn tag_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM tags;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn create_note_returns_stored_note_with_tags() {
    let conn = open_db_in_memory().unwrap();
    let user_id = insert_user(&conn, "a@example.com");
    let service = NoteService::new(SqliteNoteRepository::new(&conn));
    let ctx = RequestContext::background();

    let created = service
        .create_note(&ctx, user_id, draft("lifetimes", &["rust", "borrowck"]))
        .unwrap();
    assert_eq!(created.user_id, user_id);
    assert_eq!(created.memo_date, "20240315");
    assert_eq!(created.tag_names(), ["borrowck", "rust"]);

    let loaded = service.find_by_id(&ctx, user_id, created.id).unwrap();
    assert_eq!(loaded, created);
}

#[test]
fn same_tag_name_reuses_one_row_across_notes() {
    let conn = open_db_in_memory().unwrap();
    let user_id = insert_user(&conn, "a@example.com");
    let service = NoteService::new(SqliteNoteRepository::new(&conn));
    let ctx = RequestContext::background();

    let first = service
        .create_note(&ctx, user_id, draft("first", &["rust"]))
        .unwrap();
    let second = service
        .create_note(&ctx, user_id, draft("second", &["rust", "rust"]))
        .unwrap();

    assert_eq!(tag_count(&conn), 1);
    assert_eq!(first.tags[0].id, second.tags[0].id);
    assert_eq!(second.tags.len(), 1);

    let usage = service.list_tags(&ctx, user_id).unwrap();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].name, "rust");
    assert_eq!(usage[0].note_count, 2);
}

#[test]
fn update_replaces_tag_set_and_drops_orphans() {
    let conn = open_db_in_memory().unwrap();
    let user_id = insert_user(&conn, "a@example.com");
    let service = NoteService::new(SqliteNoteRepository::new(&conn));
    let ctx = RequestContext::background();

    let target = service
        .create_note(&ctx, user_id, draft("target", &["solo", "shared"]))
        .unwrap();
    service
        .create_note(&ctx, user_id, draft("other", &["shared"]))
        .unwrap();

    let updated = service
        .update_note(&ctx, user_id, target.id, draft("renamed", &["fresh"]))
        .unwrap();
    assert_eq!(updated.title, "renamed");
    assert_eq!(updated.created_at, target.created_at);
    assert_eq!(updated.tag_names(), ["fresh"]);

    let names: Vec<String> = service
        .list_tags(&ctx, user_id)
        .unwrap()
        .into_iter()
        .map(|usage| usage.name)
        .collect();
    assert_eq!(names, ["fresh", "shared"]);
    assert_eq!(tag_count(&conn), 2);
}

#[test]
fn delete_note_cleans_orphan_tags_only() {
    let conn = open_db_in_memory().unwrap();
    let user_id = insert_user(&conn, "a@example.com");
    let service = NoteService::new(SqliteNoteRepository::new(&conn));
    let ctx = RequestContext::background();

    let doomed = service
        .create_note(&ctx, user_id, draft("doomed", &["solo", "shared"]))
        .unwrap();
    service
        .create_note(&ctx, user_id, draft("kept", &["shared"]))
        .unwrap();

    service.delete_note(&ctx, user_id, doomed.id).unwrap();

    assert_eq!(tag_count(&conn), 1);
    let err = service.find_by_id(&ctx, user_id, doomed.id).unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "note", .. }));
    let again = service.delete_note(&ctx, user_id, doomed.id).unwrap_err();
    assert!(matches!(again, CoreError::NotFound { .. }));
}

#[test]
fn notes_are_invisible_to_other_users() {
    let conn = open_db_in_memory().unwrap();
    let owner = insert_user(&conn, "owner@example.com");
    let stranger = insert_user(&conn, "stranger@example.com");
    let service = NoteService::new(SqliteNoteRepository::new(&conn));
    let ctx = RequestContext::background();

    let note = service
        .create_note(&ctx, owner, draft("private", &["secret"]))
        .unwrap();

    assert!(matches!(
        service.find_by_id(&ctx, stranger, note.id),
        Err(CoreError::NotFound { .. })
    ));
    assert!(matches!(
        service.update_note(&ctx, stranger, note.id, draft("hijack", &[])),
        Err(CoreError::NotFound { .. })
    ));
    assert!(matches!(
        service.delete_note(&ctx, stranger, note.id),
        Err(CoreError::NotFound { .. })
    ));
    assert_eq!(service.get_notes(&ctx, stranger, Page::default()).unwrap().total_count, 0);
    assert!(service.list_tags(&ctx, stranger).unwrap().is_empty());

    let unchanged = service.find_by_id(&ctx, owner, note.id).unwrap();
    assert_eq!(unchanged.title, "private");
}

#[test]
fn get_notes_paginates_newest_first() {
    let conn = open_db_in_memory().unwrap();
    let user_id = insert_user(&conn, "a@example.com");
    let service = NoteService::new(SqliteNoteRepository::new(&conn));
    let ctx = RequestContext::background();

    for index in 0..15_i64 {
        let note = service
            .create_note(&ctx, user_id, draft(&format!("note {index}"), &[]))
            .unwrap();
        conn.execute(
            "UPDATE notes SET created_at = ?2 WHERE id = ?1;",
            params![note.id.to_string(), 1_000 + index],
        )
        .unwrap();
    }

    let first = service
        .get_notes(&ctx, user_id, Page::new(1, 10).unwrap())
        .unwrap();
    assert_eq!(first.total_count, 15);
    assert_eq!(first.items.len(), 10);
    assert_eq!(first.items[0].title, "note 14");

    let second = service
        .get_notes(&ctx, user_id, Page::new(2, 10).unwrap())
        .unwrap();
    assert_eq!(second.total_count, 15);
    assert_eq!(second.items.len(), 5);
    assert_eq!(second.items[4].title, "note 0");
}

#[test]
fn get_notes_by_tag_filters_and_counts() {
    let conn = open_db_in_memory().unwrap();
    let user_id = insert_user(&conn, "a@example.com");
    let other = insert_user(&conn, "b@example.com");
    let service = NoteService::new(SqliteNoteRepository::new(&conn));
    let ctx = RequestContext::background();

    service
        .create_note(&ctx, user_id, draft("tagged", &["rust"]))
        .unwrap();
    service
        .create_note(&ctx, user_id, draft("untagged", &["go"]))
        .unwrap();
    service
        .create_note(&ctx, other, draft("foreign", &["rust"]))
        .unwrap();

    let tagged = service
        .get_notes_by_tag(&ctx, user_id, "rust", Page::default())
        .unwrap();
    assert_eq!(tagged.total_count, 1);
    assert_eq!(tagged.items[0].title, "tagged");
    assert_eq!(tagged.items[0].tag_names(), ["rust"]);
}

#[test]
fn unknown_tag_yields_empty_page() {
    let conn = open_db_in_memory().unwrap();
    let user_id = insert_user(&conn, "a@example.com");
    let service = NoteService::new(SqliteNoteRepository::new(&conn));

    let page = service
        .get_notes_by_tag(&RequestContext::background(), user_id, "nope", Page::default())
        .unwrap();
    assert_eq!(page.total_count, 0);
    assert!(page.items.is_empty());
}

#[test]
fn tag_names_are_case_sensitive() {
    let conn = open_db_in_memory().unwrap();
    let user_id = insert_user(&conn, "a@example.com");
    let service = NoteService::new(SqliteNoteRepository::new(&conn));
    let ctx = RequestContext::background();

    service
        .create_note(&ctx, user_id, draft("upper", &["Rust"]))
        .unwrap();
    service
        .create_note(&ctx, user_id, draft("lower", &["rust"]))
        .unwrap();

    assert_eq!(tag_count(&conn), 2);
    let lower = service
        .get_notes_by_tag(&ctx, user_id, "rust", Page::default())
        .unwrap();
    assert_eq!(lower.total_count, 1);
    assert_eq!(lower.items[0].title, "lower");
}
