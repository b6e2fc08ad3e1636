//! Core domain logic for tilnote.
//! This crate is the single source of truth for business invariants; the
//! HTTP server and the email worker are thin shells around it.

pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod service;

pub use auth::{require_role, CredentialStore, CurrentUser, Role, TokenService, TOKEN_TYPE};
pub use config::AppConfig;
pub use context::RequestContext;
pub use error::{CoreError, CoreResult, FieldError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::{Note, NoteDraft, NoteId, Page, Paged, Tag, TagUsage, User, UserId};
pub use repo::job_repo::{JobQueue, SqliteJobQueue};
pub use repo::note_repo::{NoteRepository, SqliteNoteRepository};
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use repo::{RepoError, RepoResult};
pub use service::note_service::NoteService;
pub use service::user_service::{NewUser, UserService, UserUpdate};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
