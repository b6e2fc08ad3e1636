//! Request-scoped context threaded explicitly through service calls.

use crate::model::UserId;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Per-request metadata used only for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    pub user_id: Option<UserId>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            user_id: None,
        }
    }

    /// Context for work not triggered by a request (worker, tests).
    pub fn background() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

impl Display for RequestContext {
    /// Renders as `request_id=... user_id=...` for log lines.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.user_id {
            Some(user_id) => write!(f, "request_id={} user_id={}", self.request_id, user_id),
            None => write!(f, "request_id={} user_id=-", self.request_id),
        }
    }
}
