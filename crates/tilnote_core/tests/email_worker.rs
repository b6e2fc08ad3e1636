use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};
use std::cell::{Cell, RefCell};
use tilnote_core::db::open_db_in_memory;
use tilnote_core::model::new_id;
use tilnote_core::notify::{
    EmailMessage, EmailSender, QueueStats, RetryPolicy, SendError, WelcomeEmailJob,
    WelcomeEmailWorker, WorkerReport,
};
use tilnote_core::{JobQueue, SqliteJobQueue};

/// Fails the first `failures` sends, then records every delivery.
#[derive(Default)]
struct ScriptedSender {
    failures: Cell<u32>,
    delivered: RefCell<Vec<EmailMessage>>,
}

impl ScriptedSender {
    fn failing(failures: u32) -> Self {
        Self {
            failures: Cell::new(failures),
            delivered: RefCell::default(),
        }
    }
}

impl EmailSender for &ScriptedSender {
    fn send(&self, message: &EmailMessage) -> Result<(), SendError> {
        let remaining = self.failures.get();
        if remaining > 0 {
            self.failures.set(remaining - 1);
            return Err(SendError("smtp unavailable".to_string()));
        }
        self.delivered.borrow_mut().push(message.clone());
        Ok(())
    }
}

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        backoff_base: Duration::seconds(30),
        lease: Duration::seconds(60),
        batch_size: 10,
    }
}

fn enqueue_welcome(queue: &SqliteJobQueue<'_>) -> WelcomeEmailJob {
    let job = WelcomeEmailJob {
        user_id: new_id(),
        email: "ada@example.com".to_string(),
        name: "Ada".to_string(),
    };
    queue.enqueue(&job).unwrap();
    job
}

fn stats(conn: &Connection) -> QueueStats {
    SqliteJobQueue::new(conn).stats().unwrap()
}

fn settle() -> DateTime<Utc> {
    Utc::now() + Duration::milliseconds(1)
}

#[test]
fn due_job_is_sent_and_completed() {
    let conn = open_db_in_memory().unwrap();
    let queue = SqliteJobQueue::new(&conn);
    let job = enqueue_welcome(&queue);
    let sender = ScriptedSender::default();
    let worker = WelcomeEmailWorker::new(&sender, policy(3), "hello@tilnote.local");

    let report = worker.run_once(&queue, settle()).unwrap();

    assert_eq!(
        report,
        WorkerReport {
            claimed: 1,
            sent: 1,
            retried: 0,
            dead: 0,
        }
    );
    assert_eq!(stats(&conn).done, 1);
    let delivered = sender.delivered.borrow();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].to, job.email);
    assert_eq!(delivered[0].from, "hello@tilnote.local");
    assert_eq!(delivered[0].subject, "Welcome to tilnote");
    assert!(delivered[0].body.contains("Ada"));

    let idle = worker.run_once(&queue, settle()).unwrap();
    assert_eq!(idle, WorkerReport::default());
}

#[test]
fn failed_send_is_retried_after_backoff() {
    let conn = open_db_in_memory().unwrap();
    let queue = SqliteJobQueue::new(&conn);
    enqueue_welcome(&queue);
    let sender = ScriptedSender::failing(1);
    let worker = WelcomeEmailWorker::new(&sender, policy(3), "hello@tilnote.local");
    let now = settle();

    let first = worker.run_once(&queue, now).unwrap();
    assert_eq!(first.retried, 1);
    assert_eq!(stats(&conn).pending, 1);

    let too_early = worker
        .run_once(&queue, now + Duration::seconds(10))
        .unwrap();
    assert_eq!(too_early.claimed, 0);

    let retried = worker
        .run_once(&queue, now + Duration::seconds(31))
        .unwrap();
    assert_eq!(retried.sent, 1);
    assert_eq!(
        stats(&conn),
        QueueStats {
            pending: 0,
            done: 1,
            dead: 0,
        }
    );

    let (attempts, last_error): (i64, Option<String>) = conn
        .query_row(
            "SELECT attempts, last_error FROM email_jobs;",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(attempts, 2);
    assert_eq!(last_error, None);
}

#[test]
fn exhausted_job_is_marked_dead() {
    let conn = open_db_in_memory().unwrap();
    let queue = SqliteJobQueue::new(&conn);
    enqueue_welcome(&queue);
    let sender = ScriptedSender::failing(u32::MAX);
    let worker = WelcomeEmailWorker::new(&sender, policy(2), "hello@tilnote.local");
    let now = settle();

    assert_eq!(worker.run_once(&queue, now).unwrap().retried, 1);
    let last = worker
        .run_once(&queue, now + Duration::minutes(5))
        .unwrap();
    assert_eq!(last.dead, 1);
    assert_eq!(stats(&conn).dead, 1);

    let after = worker.run_once(&queue, now + Duration::days(1)).unwrap();
    assert_eq!(after.claimed, 0);

    let last_error: String = conn
        .query_row("SELECT last_error FROM email_jobs;", [], |row| row.get(0))
        .unwrap();
    assert!(last_error.contains("smtp unavailable"));
}

#[test]
fn expired_lease_makes_job_claimable_again() {
    let conn = open_db_in_memory().unwrap();
    let queue = SqliteJobQueue::new(&conn);
    enqueue_welcome(&queue);
    let now = settle();

    let first = queue.claim_due(now, Duration::seconds(60), 10).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].attempts, 1);

    let during_lease = queue
        .claim_due(now + Duration::seconds(30), Duration::seconds(60), 10)
        .unwrap();
    assert!(during_lease.is_empty());

    let after_lease = queue
        .claim_due(now + Duration::seconds(61), Duration::seconds(60), 10)
        .unwrap();
    assert_eq!(after_lease.len(), 1);
    assert_eq!(after_lease[0].id, first[0].id);
    assert_eq!(after_lease[0].attempts, 2);
}

#[test]
fn undecodable_jobs_are_retired_on_claim() {
    let conn = open_db_in_memory().unwrap();
    let queue = SqliteJobQueue::new(&conn);
    let now_ms = Utc::now().timestamp_millis();
    for (kind, payload) in [("welcome_email", "not json"), ("newsletter", "{}")] {
        conn.execute(
            "INSERT INTO email_jobs (id, kind, payload, status, attempts, available_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'pending', 0, ?4, ?4, ?4);",
            params![new_id().to_string(), kind, payload, now_ms],
        )
        .unwrap();
    }

    let claimed = queue
        .claim_due(settle(), Duration::seconds(60), 10)
        .unwrap();

    assert!(claimed.is_empty());
    assert_eq!(stats(&conn).dead, 2);
}

#[test]
fn completing_unknown_job_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let queue = SqliteJobQueue::new(&conn);

    let err = queue.complete(new_id(), Utc::now()).unwrap_err();
    assert!(matches!(err, tilnote_core::RepoError::NotFound { .. }));
}
