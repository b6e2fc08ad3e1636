//! User repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist user accounts and serve email/id lookups.
//! - Own the user-deletion cascade over notes and tags.
//!
//! # Invariants
//! - `email` is UNIQUE in storage; a duplicate insert is `Conflict` even when
//!   the service-level existence check raced.
//! - Deleting a user deletes the user's notes, their tag links and any tag
//!   left orphaned, in one transaction.

use crate::model::{Page, Paged, User, UserId};
use crate::repo::note_repo::delete_orphan_tags;
use crate::repo::{
    conflict_or_db, count_to_u64, from_millis, parse_uuid, to_millis, to_sql_int, RepoError,
    RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

const USER_SELECT_SQL: &str = "SELECT
    id,
    name,
    email,
    password,
    memo,
    created_at,
    updated_at
FROM users";

/// Repository interface for user accounts.
pub trait UserRepository {
    fn save(&self, user: &User) -> RepoResult<()>;
    /// Fails with `NotFound` when no user has this exact email.
    fn find_by_email(&self, email: &str) -> RepoResult<User>;
    fn find_by_id(&self, id: UserId) -> RepoResult<User>;
    /// Writes `name`, `password`, `memo` and `updated_at` of an existing row.
    fn update(&self, user: &User) -> RepoResult<()>;
    fn get_users(&self, page: Page) -> RepoResult<Paged<User>>;
    fn delete(&self, id: UserId) -> RepoResult<()>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
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

impl UserRepository for SqliteUserRepository<'_> {
    fn save(&self, user: &User) -> RepoResult<()> {
        let tx = self.begin()?;
        tx.execute(
            "INSERT INTO users (
                id,
                name,
                email,
                password,
                memo,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                user.id.to_string(),
                user.name.as_str(),
                user.email.as_str(),
                user.password.as_str(),
                user.memo.as_deref(),
                to_millis(user.created_at),
                to_millis(user.updated_at),
            ],
        )
        .map_err(|err| conflict_or_db(err, "user", user.email.as_str()))?;
        tx.commit()?;
        Ok(())
    }

    fn find_by_email(&self, email: &str) -> RepoResult<User> {
        let row = self
            .conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE email = ?1;"),
                [email],
                read_user_row,
            )
            .optional()?;
        match row {
            Some(raw) => raw.into_user(),
            None => Err(RepoError::not_found("user", email)),
        }
    }

    fn find_by_id(&self, id: UserId) -> RepoResult<User> {
        let row = self
            .conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                read_user_row,
            )
            .optional()?;
        match row {
            Some(raw) => raw.into_user(),
            None => Err(RepoError::not_found("user", id)),
        }
    }

    fn update(&self, user: &User) -> RepoResult<()> {
        let tx = self.begin()?;
        let changed = tx.execute(
            "UPDATE users
             SET
                name = ?2,
                password = ?3,
                memo = ?4,
                updated_at = ?5
             WHERE id = ?1;",
            params![
                user.id.to_string(),
                user.name.as_str(),
                user.password.as_str(),
                user.memo.as_deref(),
                to_millis(user.updated_at),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("user", user.id));
        }
        tx.commit()?;
        Ok(())
    }

    fn get_users(&self, page: Page) -> RepoResult<Paged<User>> {
        let total: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users;", [], |row| row.get(0))?;

        let mut stmt = self.conn.prepare(&format!(
            "{USER_SELECT_SQL}
             ORDER BY created_at ASC, id ASC
             LIMIT ?1 OFFSET ?2;"
        ))?;
        let mut rows = stmt.query(params![
            to_sql_int(page.limit()),
            to_sql_int(page.offset())
        ])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(read_user_row(row)?.into_user()?);
        }

        Ok(Paged {
            total_count: count_to_u64(total),
            items: users,
        })
    }

    fn delete(&self, id: UserId) -> RepoResult<()> {
        let id_text = id.to_string();
        let tx = self.begin()?;

        // note_tags rows go with their notes through ON DELETE CASCADE.
        tx.execute("DELETE FROM notes WHERE user_id = ?1;", [id_text.as_str()])?;
        delete_orphan_tags(&tx)?;
        let changed = tx.execute("DELETE FROM users WHERE id = ?1;", [id_text.as_str()])?;
        if changed == 0 {
            return Err(RepoError::not_found("user", id));
        }

        tx.commit()?;
        Ok(())
    }
}

/// Column values as stored, before id/timestamp parsing.
struct UserRow {
    id: String,
    name: String,
    email: String,
    password: String,
    memo: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl UserRow {
    fn into_user(self) -> RepoResult<User> {
        Ok(User {
            id: parse_uuid(&self.id, "users.id")?,
            name: self.name,
            email: self.email,
            password: self.password,
            memo: self.memo,
            created_at: from_millis(self.created_at, "users.created_at")?,
            updated_at: from_millis(self.updated_at, "users.updated_at")?,
        })
    }
}

fn read_user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        password: row.get("password")?,
        memo: row.get("memo")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
