//! Queue consumer for welcome emails.
//!
//! # Responsibility
//! - Claim due jobs, render and send the welcome message.
//! - Schedule retries with exponential backoff and retire exhausted jobs.
//!
//! # Invariants
//! - A job is marked `done` only after the sender reported success.
//! - A job whose attempt count reached `max_attempts` is never retried.

use crate::config::WorkerConfig;
use crate::notify::job::{ClaimedJob, WelcomeEmailJob};
use crate::notify::sender::{EmailMessage, EmailSender};
use crate::repo::job_repo::JobQueue;
use crate::repo::RepoResult;
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};

const WELCOME_SUBJECT: &str = "Welcome to tilnote";
const MAX_BACKOFF_EXPONENT: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub lease: Duration,
    pub batch_size: u32,
}

impl RetryPolicy {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff_base: Duration::seconds(i64::from(config.backoff_base_secs)),
            lease: Duration::seconds(i64::from(config.lease_secs)),
            batch_size: config.batch_size,
        }
    }

    /// When to try again after failed attempt number `attempts`, or `None`
    /// once the budget is spent. Delay is `backoff_base * 2^(attempts - 1)`.
    pub fn next_attempt_at(&self, attempts: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if attempts >= self.max_attempts {
            return None;
        }
        let exponent = attempts.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        Some(now + self.backoff_base * 2_i32.pow(exponent))
    }
}

/// Outcome counters for one polling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub claimed: usize,
    pub sent: usize,
    pub retried: usize,
    pub dead: usize,
}

pub struct WelcomeEmailWorker<S: EmailSender> {
    sender: S,
    policy: RetryPolicy,
    from_address: String,
}

impl<S: EmailSender> WelcomeEmailWorker<S> {
    pub fn new(sender: S, policy: RetryPolicy, from_address: impl Into<String>) -> Self {
        Self {
            sender,
            policy,
            from_address: from_address.into(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Processes every job due at `now`, up to the batch size.
    pub fn run_once<Q: JobQueue>(&self, queue: &Q, now: DateTime<Utc>) -> RepoResult<WorkerReport> {
        let jobs = queue.claim_due(now, self.policy.lease, self.policy.batch_size)?;
        let mut report = WorkerReport {
            claimed: jobs.len(),
            ..WorkerReport::default()
        };

        for claimed in jobs {
            let message = self.render(&claimed.job);
            match self.sender.send(&message) {
                Ok(()) => {
                    queue.complete(claimed.id, now)?;
                    report.sent += 1;
                    info!(
                        "event=welcome_email module=worker status=ok job_id={} user_id={} attempt={}",
                        claimed.id, claimed.job.user_id, claimed.attempts
                    );
                }
                Err(err) => {
                    self.record_failure(queue, &claimed, &err.to_string(), now, &mut report)?;
                }
            }
        }

        Ok(report)
    }

    fn record_failure<Q: JobQueue>(
        &self,
        queue: &Q,
        claimed: &ClaimedJob,
        error: &str,
        now: DateTime<Utc>,
        report: &mut WorkerReport,
    ) -> RepoResult<()> {
        let retry_at = self.policy.next_attempt_at(claimed.attempts, now);
        queue.fail(claimed.id, error, retry_at, now)?;
        match retry_at {
            Some(at) => {
                report.retried += 1;
                warn!(
                    "event=welcome_email module=worker status=error job_id={} attempt={} retry_at={} error={}",
                    claimed.id,
                    claimed.attempts,
                    at.to_rfc3339(),
                    error
                );
            }
            None => {
                report.dead += 1;
                warn!(
                    "event=welcome_email module=worker status=error job_id={} attempt={} error_code=retries_exhausted error={}",
                    claimed.id, claimed.attempts, error
                );
            }
        }
        Ok(())
    }

    fn render(&self, job: &WelcomeEmailJob) -> EmailMessage {
        EmailMessage {
            from: self.from_address.clone(),
            to: job.email.clone(),
            subject: WELCOME_SUBJECT.to_string(),
            body: format!(
                "Hi {},\n\nThank you for joining tilnote. Happy learning!\n",
                job.name
            ),
        }
    }
}
