//! Domain error taxonomy shared by services and the HTTP boundary.
//!
//! Repositories raise [`RepoError`](crate::repo::RepoError); services convert
//! it into [`CoreError`] and let it propagate unchanged. The HTTP layer is the
//! only place that turns these kinds into status codes.

use crate::repo::RepoError;
use serde::Serialize;
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or out-of-range input.
    #[error("validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),

    /// Missing, invalid or expired token, or bad credentials.
    #[error("unauthenticated")]
    Unauthenticated,

    /// Authenticated but the role does not match.
    #[error("forbidden")]
    Forbidden,

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} already exists: {key}")]
    Conflict { entity: &'static str, key: String },

    /// Persistence, hashing or signing failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    /// Stable machine-readable kind, used in logs and response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<RepoError> for CoreError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepoError::Conflict { entity, key } => Self::Conflict { entity, key },
            other => Self::Internal(other.to_string()),
        }
    }
}

fn summarize(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|field| format!("{}: {}", field.field, field.message))
        .collect::<Vec<_>>()
        .join("; ")
}
