//! Task queue for ingestion jobs, backed by a Redis list.
//!
//! Producers `LPUSH` JSON messages and workers `BRPOP` them, so each message
//! is consumed exactly once. Job outcomes are kept under a per-job key with a
//! TTL so the review UI can poll them; a pending record is written together
//! with the enqueue.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::ingestion::task::{IngestionJob, IngestionOutcome, PersistMode};

const QUEUE_KEY: &str = "hirehub:cv_ingest:queue";
const RESULT_KEY_PREFIX: &str = "hirehub:cv_ingest:result:";

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Failed to encode queue payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// A message was popped but could not be decoded; it is gone from the queue.
    #[error("Dropped malformed queue message: {0}")]
    Malformed(serde_json::Error),
}

/// Status of one job as seen by pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub company_id: i64,
    pub filename: String,
    pub mode: PersistMode,
    /// `None` while the job is waiting for or running on a worker.
    pub outcome: Option<IngestionOutcome>,
    pub enqueued_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn pending(job: &IngestionJob) -> Self {
        Self {
            job_id: job.job_id,
            company_id: job.company_id,
            filename: job.filename.clone(),
            mode: job.mode,
            outcome: None,
            enqueued_at: job.enqueued_at,
            finished_at: None,
        }
    }

    pub fn finish(mut self, outcome: IngestionOutcome) -> Self {
        self.outcome = Some(outcome);
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn status(&self) -> &'static str {
        self.outcome.as_ref().map_or("pending", IngestionOutcome::status)
    }
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Fire-and-forget: returns once the message is queued.
    async fn enqueue(&self, job: &IngestionJob) -> Result<(), QueueError>;

    /// Waits up to `wait` for the next job.
    async fn dequeue(&self, wait: Duration) -> Result<Option<IngestionJob>, QueueError>;

    async fn record_result(&self, record: &JobRecord) -> Result<(), QueueError>;

    async fn fetch_result(&self, job_id: Uuid) -> Result<Option<JobRecord>, QueueError>;
}

/// Redis implementation. Each worker should hold its own instance because
/// `BRPOP` occupies the connection while it waits.
#[derive(Clone)]
pub struct RedisJobQueue {
    conn: MultiplexedConnection,
    result_ttl_secs: u64,
}

impl RedisJobQueue {
    pub async fn connect(client: &redis::Client, result_ttl_secs: u64) -> Result<Self, QueueError> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn,
            result_ttl_secs,
        })
    }
}

fn result_key(job_id: Uuid) -> String {
    format!("{RESULT_KEY_PREFIX}{job_id}")
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: &IngestionJob) -> Result<(), QueueError> {
        let message = serde_json::to_string(job)?;
        let pending = serde_json::to_string(&JobRecord::pending(job))?;
        let mut conn = self.conn.clone();

        redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(result_key(job.job_id))
            .arg(pending)
            .arg("EX")
            .arg(self.result_ttl_secs)
            .ignore()
            .cmd("LPUSH")
            .arg(QUEUE_KEY)
            .arg(message)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<IngestionJob>, QueueError> {
        let mut conn = self.conn.clone();
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(QUEUE_KEY)
            .arg(wait.as_secs().max(1))
            .query_async(&mut conn)
            .await?;

        match popped {
            Some((_, message)) => serde_json::from_str(&message)
                .map(Some)
                .map_err(QueueError::Malformed),
            None => Ok(None),
        }
    }

    async fn record_result(&self, record: &JobRecord) -> Result<(), QueueError> {
        let payload = serde_json::to_string(record)?;
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(result_key(record.job_id))
            .arg(payload)
            .arg("EX")
            .arg(self.result_ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn fetch_result(&self, job_id: Uuid) -> Result<Option<JobRecord>, QueueError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = redis::cmd("GET")
            .arg(result_key(job_id))
            .query_async(&mut conn)
            .await?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(QueueError::Malformed))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_record_reports_pending() {
        let job = IngestionJob::new(b"%PDF", "cv.pdf", 3, 30, PersistMode::ReviewOnly);
        let record = JobRecord::pending(&job);
        assert_eq!(record.status(), "pending");
        assert_eq!(record.company_id, 3);
        assert!(record.finished_at.is_none());
    }

    #[test]
    fn test_finished_record_reports_outcome_status() {
        let job = IngestionJob::new(b"%PDF", "cv.pdf", 3, 30, PersistMode::Immediate);
        let record = JobRecord::pending(&job).finish(IngestionOutcome::NoText {
            filename: "cv.pdf".to_string(),
        });
        assert_eq!(record.status(), "no_text");
        assert!(record.finished_at.is_some());
    }

    #[test]
    fn test_job_message_wire_format() {
        let job = IngestionJob::new(b"abc", "cv.pdf", 3, 30, PersistMode::Immediate);
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["encoded_file"], "YWJj");
        assert_eq!(value["filename"], "cv.pdf");
        assert_eq!(value["company_id"], 3);
        assert_eq!(value["employee_id"], 30);
        assert_eq!(value["mode"], "immediate");

        let decoded: IngestionJob = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.enqueued_at, job.enqueued_at);
    }

    #[test]
    fn test_result_key_is_namespaced() {
        let id = Uuid::nil();
        assert_eq!(
            result_key(id),
            "hirehub:cv_ingest:result:00000000-0000-0000-0000-000000000000"
        );
    }
}
