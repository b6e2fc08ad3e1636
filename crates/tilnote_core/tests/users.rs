use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};
use tilnote_core::db::open_db_in_memory;
use tilnote_core::notify::{ClaimedJob, JobId, QueueStats, WelcomeEmailJob};
use tilnote_core::repo::RepoResult;
use tilnote_core::{
    CoreError, CredentialStore, JobQueue, NewUser, NoteDraft, NoteService, Page, RepoError,
    RequestContext, Role, SqliteJobQueue, SqliteNoteRepository, SqliteUserRepository,
    TokenService, UserService, UserUpdate,
};

const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

fn tokens() -> TokenService {
    TokenService::new(SECRET, Duration::hours(1))
}

fn service<'a>(
    conn: &'a Connection,
    credentials: &'a CredentialStore,
    tokens: &'a TokenService,
) -> UserService<'a, SqliteUserRepository<'a>, SqliteJobQueue<'a>> {
    UserService::new(
        SqliteUserRepository::new(conn),
        SqliteJobQueue::new(conn),
        credentials,
        tokens,
    )
}

fn new_user(email: &str) -> NewUser {
    NewUser {
        name: "Ada".to_string(),
        email: email.to_string(),
        password: "correct horse".to_string(),
        memo: None,
    }
}

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

#[test]
fn create_user_then_login_issues_user_token() {
    let conn = open_db_in_memory().unwrap();
    let credentials = CredentialStore::minimal();
    let tokens = tokens();
    let users = service(&conn, &credentials, &tokens);
    let ctx = RequestContext::background();

    let created = users.create_user(&ctx, new_user("ada@example.com")).unwrap();
    assert_ne!(created.password, "correct horse");
    assert!(created.password.starts_with("$argon2"));

    let token = users
        .login(&ctx, "ada@example.com", "correct horse")
        .unwrap();
    let current = tokens.verify(&token).unwrap();
    assert_eq!(current.id, created.id);
    assert_eq!(current.role, Role::User);
}

#[test]
fn duplicate_email_is_conflict_and_keeps_single_row() {
    let conn = open_db_in_memory().unwrap();
    let credentials = CredentialStore::minimal();
    let tokens = tokens();
    let users = service(&conn, &credentials, &tokens);
    let ctx = RequestContext::background();

    users.create_user(&ctx, new_user("ada@example.com")).unwrap();
    let err = users
        .create_user(&ctx, new_user("ada@example.com"))
        .unwrap_err();

    assert!(matches!(err, CoreError::Conflict { entity: "user", .. }));
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM users;"), 1);
}

#[test]
fn login_rejects_wrong_password_and_unknown_email() {
    let conn = open_db_in_memory().unwrap();
    let credentials = CredentialStore::minimal();
    let tokens = tokens();
    let users = service(&conn, &credentials, &tokens);
    let ctx = RequestContext::background();
    users.create_user(&ctx, new_user("ada@example.com")).unwrap();

    let wrong = users.login(&ctx, "ada@example.com", "wrong").unwrap_err();
    assert!(matches!(wrong, CoreError::Unauthenticated));

    let unknown = users
        .login(&ctx, "nobody@example.com", "correct horse")
        .unwrap_err();
    assert!(matches!(unknown, CoreError::Unauthenticated));
}

#[test]
fn update_user_changes_only_provided_fields() {
    let conn = open_db_in_memory().unwrap();
    let credentials = CredentialStore::minimal();
    let tokens = tokens();
    let users = service(&conn, &credentials, &tokens);
    let ctx = RequestContext::background();
    let created = users.create_user(&ctx, new_user("ada@example.com")).unwrap();

    let renamed = users
        .update_user(
            &ctx,
            created.id,
            UserUpdate {
                name: Some("Ada L.".to_string()),
                password: None,
            },
        )
        .unwrap();
    assert_eq!(renamed.name, "Ada L.");
    assert_eq!(renamed.password, created.password);
    assert!(renamed.updated_at >= created.updated_at);

    users
        .update_user(
            &ctx,
            created.id,
            UserUpdate {
                name: None,
                password: Some("new secret".to_string()),
            },
        )
        .unwrap();
    assert!(users.login(&ctx, "ada@example.com", "correct horse").is_err());
    assert!(users.login(&ctx, "ada@example.com", "new secret").is_ok());

    let stored_name: String = conn
        .query_row("SELECT name FROM users;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(stored_name, "Ada L.");
}

#[test]
fn update_missing_user_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let credentials = CredentialStore::minimal();
    let tokens = tokens();
    let users = service(&conn, &credentials, &tokens);

    let err = users
        .update_user(
            &RequestContext::background(),
            tilnote_core::model::new_id(),
            UserUpdate::default(),
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "user", .. }));
}

#[test]
fn get_users_pages_in_creation_order() {
    let conn = open_db_in_memory().unwrap();
    let credentials = CredentialStore::minimal();
    let tokens = tokens();
    let users = service(&conn, &credentials, &tokens);
    let ctx = RequestContext::background();

    let emails = ["a@example.com", "b@example.com", "c@example.com"];
    for (index, email) in emails.iter().enumerate() {
        let user = users.create_user(&ctx, new_user(email)).unwrap();
        conn.execute(
            "UPDATE users SET created_at = ?2 WHERE id = ?1;",
            params![user.id.to_string(), 1_000 * (index as i64 + 1)],
        )
        .unwrap();
    }

    let first = users.get_users(&ctx, Page::new(1, 2).unwrap()).unwrap();
    assert_eq!(first.total_count, 3);
    let first_emails: Vec<_> = first.items.iter().map(|user| user.email.as_str()).collect();
    assert_eq!(first_emails, ["a@example.com", "b@example.com"]);

    let second = users.get_users(&ctx, Page::new(2, 2).unwrap()).unwrap();
    assert_eq!(second.total_count, 3);
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].email, "c@example.com");

    let beyond = users.get_users(&ctx, Page::new(5, 2).unwrap()).unwrap();
    assert_eq!(beyond.total_count, 3);
    assert!(beyond.items.is_empty());
}

#[test]
fn delete_user_removes_notes_and_orphaned_tags() {
    let conn = open_db_in_memory().unwrap();
    let credentials = CredentialStore::minimal();
    let tokens = tokens();
    let users = service(&conn, &credentials, &tokens);
    let notes = NoteService::new(SqliteNoteRepository::new(&conn));
    let ctx = RequestContext::background();

    let leaving = users.create_user(&ctx, new_user("leaving@example.com")).unwrap();
    let staying = users.create_user(&ctx, new_user("staying@example.com")).unwrap();
    notes
        .create_note(&ctx, leaving.id, draft(&["solo", "shared"]))
        .unwrap();
    notes
        .create_note(&ctx, staying.id, draft(&["shared"]))
        .unwrap();

    users.delete_user(&ctx, leaving.id).unwrap();

    assert_eq!(count(&conn, "SELECT COUNT(*) FROM users;"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM notes;"), 1);
    let remaining: Vec<String> = notes
        .list_tags(&ctx, staying.id)
        .unwrap()
        .into_iter()
        .map(|usage| usage.name)
        .collect();
    assert_eq!(remaining, ["shared"]);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM tags;"), 1);

    let again = users.delete_user(&ctx, leaving.id).unwrap_err();
    assert!(matches!(again, CoreError::NotFound { .. }));
}

#[test]
fn create_user_enqueues_welcome_email() {
    let conn = open_db_in_memory().unwrap();
    let credentials = CredentialStore::minimal();
    let tokens = tokens();
    let users = service(&conn, &credentials, &tokens);

    let created = users
        .create_user(&RequestContext::background(), new_user("ada@example.com"))
        .unwrap();

    let queue = SqliteJobQueue::new(&conn);
    assert_eq!(
        queue.stats().unwrap(),
        QueueStats {
            pending: 1,
            done: 0,
            dead: 0,
        }
    );
    let claimed = queue
        .claim_due(Utc::now(), Duration::seconds(60), 10)
        .unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].job.user_id, created.id);
    assert_eq!(claimed[0].job.email, "ada@example.com");
}

struct BrokenQueue;

impl JobQueue for BrokenQueue {
    fn enqueue(&self, _job: &WelcomeEmailJob) -> RepoResult<JobId> {
        Err(RepoError::InvalidData("queue offline".to_string()))
    }

    fn claim_due(
        &self,
        _now: DateTime<Utc>,
        _lease: Duration,
        _limit: u32,
    ) -> RepoResult<Vec<ClaimedJob>> {
        Ok(Vec::new())
    }

    fn complete(&self, _id: JobId, _now: DateTime<Utc>) -> RepoResult<()> {
        Ok(())
    }

    fn fail(
        &self,
        _id: JobId,
        _error: &str,
        _retry_at: Option<DateTime<Utc>>,
        _now: DateTime<Utc>,
    ) -> RepoResult<()> {
        Ok(())
    }

    fn stats(&self) -> RepoResult<QueueStats> {
        Ok(QueueStats::default())
    }
}

#[test]
fn enqueue_failure_does_not_fail_registration() {
    let conn = open_db_in_memory().unwrap();
    let credentials = CredentialStore::minimal();
    let tokens = tokens();
    let users = UserService::new(
        SqliteUserRepository::new(&conn),
        BrokenQueue,
        &credentials,
        &tokens,
    );

    let created = users
        .create_user(&RequestContext::background(), new_user("ada@example.com"))
        .unwrap();
    assert_eq!(created.email, "ada@example.com");
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM users;"), 1);
}

fn draft(tags: &[&str]) -> NoteDraft {
    NoteDraft {
        title: "TIL".to_string(),
        content: "borrowck".to_string(),
        memo_date: "20240101".to_string(),
        tag_names: tags.iter().map(|tag| tag.to_string()).collect(),
    }
}
