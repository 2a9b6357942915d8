//! Bulk Upload Coordinator: one independent queued job per uploaded file.

use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ingestion::task::{IngestionJob, PersistMode};
use crate::queue::JobQueue;

/// A file part pulled out of a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueuedFile {
    pub job_id: Uuid,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub filename: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkEnqueueReport {
    pub queued: Vec<QueuedFile>,
    pub failed: Vec<FailedFile>,
}

impl BulkEnqueueReport {
    pub fn reject(&mut self, filename: impl Into<String>, error: impl Into<String>) {
        self.failed.push(FailedFile {
            filename: filename.into(),
            error: error.into(),
        });
    }
}

/// Enqueues every file and returns without waiting for any of them to run.
/// A file that cannot be enqueued is reported and the rest carry on.
pub async fn enqueue_bulk(
    queue: &dyn JobQueue,
    company_id: i64,
    employee_id: i64,
    files: Vec<UploadedFile>,
    mode: PersistMode,
    report: &mut BulkEnqueueReport,
) {
    for file in files {
        let job = IngestionJob::new(&file.bytes, file.filename, company_id, employee_id, mode);
        match queue.enqueue(&job).await {
            Ok(()) => {
                info!(job_id = %job.job_id, company_id, filename = %job.filename, "Queued CV");
                report.queued.push(QueuedFile {
                    job_id: job.job_id,
                    filename: job.filename,
                });
            }
            Err(e) => {
                warn!(company_id, filename = %job.filename, "Failed to queue CV: {e}");
                report.reject(job.filename, e.to_string());
            }
        }
    }
}
