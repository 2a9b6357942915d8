//! Worker pool: long-running loops that pull ingestion jobs off the queue.
//!
//! Each job runs in its own tokio task so a panic inside one file is reported
//! as that file's `internal_error` and the loop keeps going. Shutdown is
//! checked between jobs; a job that has started always finishes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::ingestion::task::{run_job, IngestionJob, IngestionOutcome};
use crate::ingestion::Pipeline;
use crate::queue::{JobQueue, JobRecord, QueueError};

const POLL_WAIT: Duration = Duration::from_secs(5);
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Starts one loop per queue handle.
pub fn spawn_workers(
    queues: Vec<Arc<dyn JobQueue>>,
    pipeline: Pipeline,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    queues
        .into_iter()
        .enumerate()
        .map(|(worker_id, queue)| {
            tokio::spawn(run_worker(worker_id, queue, pipeline.clone(), shutdown.clone()))
        })
        .collect()
}

pub async fn run_worker(
    worker_id: usize,
    queue: Arc<dyn JobQueue>,
    pipeline: Pipeline,
    shutdown: watch::Receiver<bool>,
) {
    info!(worker_id, "Ingestion worker started");

    loop {
        let stopping = *shutdown.borrow();
        if stopping {
            break;
        }
        match queue.dequeue(POLL_WAIT).await {
            Ok(Some(job)) => process_job(queue.as_ref(), &pipeline, job).await,
            Ok(None) => {}
            Err(e @ QueueError::Malformed(_)) => warn!(worker_id, "{e}"),
            Err(e) => {
                error!(worker_id, "Queue error, backing off: {e}");
                tokio::time::sleep(ERROR_BACKOFF).await;
            }
        }
    }

    info!(worker_id, "Ingestion worker stopped");
}

/// Runs one job and publishes its outcome.
pub async fn process_job(queue: &dyn JobQueue, pipeline: &Pipeline, job: IngestionJob) {
    let pending = JobRecord::pending(&job);
    let job_id = job.job_id;
    let filename = job.filename.clone();

    let task_pipeline = pipeline.clone();
    let handle = tokio::spawn(async move { run_job(&task_pipeline, &job).await });
    let outcome = match handle.await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(%job_id, filename = %filename, "Ingestion job panicked: {e}");
            IngestionOutcome::internal_error(&filename, "Unexpected error while processing file")
        }
    };

    info!(%job_id, filename = %filename, status = outcome.status(), "Ingestion job finished");

    if let Err(e) = queue.record_result(&pending.finish(outcome)).await {
        error!(%job_id, "Failed to record job result: {e}");
    }
}
