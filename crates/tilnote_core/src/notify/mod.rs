//! Welcome-email side effect, decoupled from requests through a job queue.
//!
//! # Responsibility
//! - Define the typed job the user service produces.
//! - Deliver queued jobs from a separate worker with retry and backoff.
//!
//! # Invariants
//! - Producing a job never fails the request that triggered it.
//! - Delivery is at-least-once; a duplicate welcome email is acceptable.

pub mod job;
pub mod sender;
pub mod worker;

pub use job::{ClaimedJob, JobId, QueueStats, WelcomeEmailJob};
pub use sender::{EmailMessage, EmailSender, LogEmailSender, SendError};
pub use worker::{RetryPolicy, WelcomeEmailWorker, WorkerReport};
