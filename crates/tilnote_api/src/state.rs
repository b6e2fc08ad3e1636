//! Shared handler state and the bridge from async handlers to blocking
//! storage calls.
//!
//! # Invariants
//! - No connection outlives one `run_blocking` call; each call opens its own
//!   and drops it before the future resolves.

use crate::error::ApiError;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tilnote_core::db::open_db;
use tilnote_core::{AppConfig, CoreError, CoreResult, CredentialStore, RepoError, TokenService};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<StateInner>,
}

struct StateInner {
    db_path: PathBuf,
    credentials: CredentialStore,
    tokens: TokenService,
}

impl AppState {
    pub fn new(db_path: impl Into<PathBuf>, credentials: CredentialStore, tokens: TokenService) -> Self {
        Self {
            inner: Arc::new(StateInner {
                db_path: db_path.into(),
                credentials,
                tokens,
            }),
        }
    }

    pub fn from_config(config: &AppConfig) -> CoreResult<Self> {
        Ok(Self::new(
            &config.database.path,
            CredentialStore::new(config.auth.hash)?,
            TokenService::from_config(&config.auth),
        ))
    }

    pub fn db_path(&self) -> &Path {
        &self.inner.db_path
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    /// Runs `job` on the blocking pool with a freshly opened connection.
    pub async fn run_blocking<T, F>(&self, job: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Connection, &AppState) -> CoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = self.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let conn = open_db(state.db_path()).map_err(|err| CoreError::from(RepoError::from(err)))?;
            job(&conn, &state)
        })
        .await
        .map_err(|err| CoreError::Internal(format!("blocking task failed: {err}")))?;

        Ok(outcome?)
    }
}
