//! Persistent job queue for out-of-band email delivery.
//!
//! # Responsibility
//! - Store typed jobs produced by request handlers.
//! - Hand due jobs to a worker under a lease, and record the outcome.
//!
//! # Invariants
//! - Claiming bumps `attempts` and pushes `available_at` past the lease, so a
//!   worker that dies mid-send leaves the job due again later (at-least-once).
//! - `done` and `dead` are terminal; only `pending` jobs are ever claimed.

use crate::model::new_id;
use crate::notify::job::{ClaimedJob, JobId, QueueStats, WelcomeEmailJob};
use crate::repo::{count_to_u64, parse_uuid, to_millis, RepoError, RepoResult};
use chrono::{DateTime, Duration, Utc};
use log::warn;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};

/// Queue contract shared by the producer (user service) and the worker.
pub trait JobQueue {
    fn enqueue(&self, job: &WelcomeEmailJob) -> RepoResult<JobId>;
    /// Leases up to `limit` due jobs until `now + lease`.
    fn claim_due(
        &self,
        now: DateTime<Utc>,
        lease: Duration,
        limit: u32,
    ) -> RepoResult<Vec<ClaimedJob>>;
    fn complete(&self, id: JobId, now: DateTime<Utc>) -> RepoResult<()>;
    /// Records a failed attempt; `retry_at = None` makes the job dead.
    fn fail(
        &self,
        id: JobId,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> RepoResult<()>;
    fn stats(&self) -> RepoResult<QueueStats>;
}

pub struct SqliteJobQueue<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteJobQueue<'conn> {
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

impl JobQueue for SqliteJobQueue<'_> {
    fn enqueue(&self, job: &WelcomeEmailJob) -> RepoResult<JobId> {
        let payload = serde_json::to_string(job)
            .map_err(|err| RepoError::InvalidData(format!("unserializable job payload: {err}")))?;
        let id = new_id();
        let now = to_millis(Utc::now());

        self.conn.execute(
            "INSERT INTO email_jobs (
                id,
                kind,
                payload,
                status,
                attempts,
                available_at,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, 'pending', 0, ?4, ?4, ?4);",
            params![id.to_string(), WelcomeEmailJob::KIND, payload, now],
        )?;
        Ok(id)
    }

    fn claim_due(
        &self,
        now: DateTime<Utc>,
        lease: Duration,
        limit: u32,
    ) -> RepoResult<Vec<ClaimedJob>> {
        let now_ms = to_millis(now);
        let leased_until = to_millis(now + lease);
        let tx = self.begin()?;

        let due = {
            let mut stmt = tx.prepare(
                "SELECT id, kind, payload, attempts
                 FROM email_jobs
                 WHERE status = 'pending'
                   AND available_at <= ?1
                 ORDER BY available_at ASC, id ASC
                 LIMIT ?2;",
            )?;
            let rows = stmt.query_map(params![now_ms, i64::from(limit)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut claimed = Vec::with_capacity(due.len());
        for (id_text, kind, payload, attempts) in due {
            let id = parse_uuid(&id_text, "email_jobs.id")?;
            let decoded = if kind == WelcomeEmailJob::KIND {
                serde_json::from_str::<WelcomeEmailJob>(&payload).map_err(|err| err.to_string())
            } else {
                Err(format!("unknown job kind `{kind}`"))
            };

            match decoded {
                Ok(job) => {
                    tx.execute(
                        "UPDATE email_jobs
                         SET attempts = attempts + 1,
                             available_at = ?2,
                             updated_at = ?3
                         WHERE id = ?1;",
                        params![id_text, leased_until, now_ms],
                    )?;
                    claimed.push(ClaimedJob {
                        id,
                        attempts: u32::try_from(attempts + 1).unwrap_or(u32::MAX),
                        job,
                    });
                }
                Err(reason) => {
                    // Undecodable jobs can never succeed; retire them now.
                    warn!(
                        "event=job_claim module=queue status=error job_id={} error_code=job_undecodable",
                        id
                    );
                    tx.execute(
                        "UPDATE email_jobs
                         SET status = 'dead',
                             last_error = ?2,
                             updated_at = ?3
                         WHERE id = ?1;",
                        params![id_text, reason, now_ms],
                    )?;
                }
            }
        }

        tx.commit()?;
        Ok(claimed)
    }

    fn complete(&self, id: JobId, now: DateTime<Utc>) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE email_jobs
             SET status = 'done',
                 last_error = NULL,
                 updated_at = ?2
             WHERE id = ?1
               AND status = 'pending';",
            params![id.to_string(), to_millis(now)],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("job", id));
        }
        Ok(())
    }

    fn fail(
        &self,
        id: JobId,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> RepoResult<()> {
        let changed = match retry_at {
            Some(at) => self.conn.execute(
                "UPDATE email_jobs
                 SET last_error = ?2,
                     available_at = ?3,
                     updated_at = ?4
                 WHERE id = ?1
                   AND status = 'pending';",
                params![id.to_string(), error, to_millis(at), to_millis(now)],
            )?,
            None => self.conn.execute(
                "UPDATE email_jobs
                 SET status = 'dead',
                     last_error = ?2,
                     updated_at = ?3
                 WHERE id = ?1
                   AND status = 'pending';",
                params![id.to_string(), error, to_millis(now)],
            )?,
        };
        if changed == 0 {
            return Err(RepoError::not_found("job", id));
        }
        Ok(())
    }

    fn stats(&self) -> RepoResult<QueueStats> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM email_jobs GROUP BY status;")?;
        let mut rows = stmt.query([])?;
        let mut stats = QueueStats::default();
        while let Some(row) = rows.next()? {
            let status: String = row.get(0)?;
            let count = count_to_u64(row.get(1)?);
            match status.as_str() {
                "pending" => stats.pending = count,
                "done" => stats.done = count,
                "dead" => stats.dead = count,
                other => {
                    return Err(RepoError::InvalidData(format!(
                        "invalid job status `{other}` in email_jobs.status"
                    )))
                }
            }
        }
        Ok(stats)
    }
}
