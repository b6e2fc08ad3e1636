//! Job payloads and queue bookkeeping types.

use crate::model::UserId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type JobId = Uuid;

/// Request to greet a newly registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeEmailJob {
    pub user_id: UserId,
    pub email: String,
    pub name: String,
}

impl WelcomeEmailJob {
    /// Value stored in `email_jobs.kind`.
    pub const KIND: &'static str = "welcome_email";
}

/// A leased job handed to the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedJob {
    pub id: JobId,
    /// Attempt number of this delivery, starting at 1.
    pub attempts: u32,
    pub job: WelcomeEmailJob,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: u64,
    pub done: u64,
    pub dead: u64,
}
