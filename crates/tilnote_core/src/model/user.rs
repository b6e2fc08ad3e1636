//! User account record.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub type UserId = Uuid;

/// Persisted user account.
///
/// `password` holds the PHC-format hash and is skipped on serialization;
/// `memo` is internal and also never serialized outward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_serializing)]
    pub memo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
