//! Axum route handlers for the CV ingestion API.

use std::time::Duration;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::ingestion::bulk::{enqueue_bulk, BulkEnqueueReport, FailedFile, QueuedFile, UploadedFile};
use crate::ingestion::review::{approve_candidates, ApprovalReport, CandidateProposal};
use crate::ingestion::task::{parse_document, ParseFailure, PersistMode};
use crate::queue::JobRecord;
use crate::state::AppState;
use crate::tenancy::TenantContext;

/// Multipart field carrying the file for the synchronous parse endpoint.
pub const CV_FILE_FIELD: &str = "cv_file";
/// Where the dashboard sends the user after approving candidates.
pub const DASHBOARD_URL: &str = "/portal/dashboard/";
/// Headroom on top of the AI timeout for text extraction and retries.
const PARSE_TIMEOUT_MARGIN: Duration = Duration::from_secs(15);

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ParsedCvResponse {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ParseErrorResponse {
    pub error: String,
    pub original_filename: String,
}

#[derive(Debug, Serialize)]
pub struct BulkUploadResponse {
    pub queued: usize,
    pub jobs: Vec<QueuedFile>,
    pub failed: Vec<FailedFile>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub record: JobRecord,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub candidates: Vec<CandidateProposal>,
}

#[derive(Debug, Serialize)]
pub struct ApproveResponse {
    pub success: bool,
    pub message: String,
    pub redirect_url: String,
    #[serde(flatten)]
    pub report: ApprovalReport,
}

#[derive(Debug, Serialize)]
pub struct ApproveErrorResponse {
    pub error: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/cv/parse
///
/// Parses one CV synchronously and returns the extracted fields without
/// saving anything.
pub async fn handle_parse_cv(
    State(state): State<AppState>,
    _tenant: TenantContext,
    mut multipart: Multipart,
) -> Response {
    let upload = match read_named_file(&mut multipart, CV_FILE_FIELD).await {
        Ok(Some(upload)) => upload,
        Ok(None) => return parse_error(StatusCode::BAD_REQUEST, "No file uploaded.", ""),
        Err(e) => {
            return parse_error(
                StatusCode::BAD_REQUEST,
                &format!("Could not read upload: {e}"),
                "",
            )
        }
    };

    if upload.bytes.len() > state.config.max_upload_bytes {
        return parse_error(
            StatusCode::PAYLOAD_TOO_LARGE,
            &format!(
                "File exceeds the {} byte upload limit.",
                state.config.max_upload_bytes
            ),
            &upload.filename,
        );
    }

    let bound = Duration::from_secs(state.config.ai_timeout_secs) + PARSE_TIMEOUT_MARGIN;
    let parsed = tokio::time::timeout(
        bound,
        parse_document(&state.pipeline, &upload.filename, upload.bytes.clone()),
    )
    .await;

    match parsed {
        Ok(Ok(parsed)) => Json(ParsedCvResponse {
            first_name: parsed.result.first_name,
            last_name: parsed.result.last_name,
            email: parsed.email,
        })
        .into_response(),
        Ok(Err(ParseFailure::Internal(e))) => {
            tracing::error!(filename = %upload.filename, "CV parse failed: {e:#}");
            parse_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred while parsing the file.",
                &upload.filename,
            )
        }
        Ok(Err(failure)) => parse_error(
            StatusCode::BAD_REQUEST,
            &failure.to_string(),
            &upload.filename,
        ),
        Err(_) => parse_error(
            StatusCode::GATEWAY_TIMEOUT,
            "Parsing the file timed out. Please try again.",
            &upload.filename,
        ),
    }
}

/// POST /api/v1/cv/bulk-upload
///
/// Queues every uploaded file for immediate candidate creation.
pub async fn handle_bulk_upload(
    State(state): State<AppState>,
    tenant: TenantContext,
    multipart: Multipart,
) -> Result<(StatusCode, Json<BulkUploadResponse>), AppError> {
    enqueue_uploads(&state, &tenant, multipart, PersistMode::Immediate).await
}

/// POST /api/v1/cv/review-upload
///
/// Queues every uploaded file for parsing only; results are polled per job
/// and approved through `/api/v1/candidates/approve`.
pub async fn handle_review_upload(
    State(state): State<AppState>,
    tenant: TenantContext,
    multipart: Multipart,
) -> Result<(StatusCode, Json<BulkUploadResponse>), AppError> {
    enqueue_uploads(&state, &tenant, multipart, PersistMode::ReviewOnly).await
}

/// GET /api/v1/cv/jobs/:job_id
pub async fn handle_job_status(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, AppError> {
    let record = state
        .queue
        .fetch_result(job_id)
        .await?
        .filter(|r| r.company_id == tenant.company_id())
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;

    Ok(Json(JobStatusResponse {
        status: record.status(),
        record,
    }))
}

/// POST /api/v1/candidates/approve
pub async fn handle_approve_candidates(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(request): Json<ApproveRequest>,
) -> Response {
    let attempted = request.candidates.len();
    let report = approve_candidates(&state.pipeline, &tenant.employee, request.candidates).await;

    // Every attempted write failed: the store is down, not the data.
    if report.failed > 0 && report.created == 0 && report.duplicates == 0 {
        tracing::error!(
            company_id = tenant.company_id(),
            attempted,
            "No approved candidate could be saved"
        );
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApproveErrorResponse {
                error: "An unexpected error occurred while saving candidates.".to_string(),
            }),
        )
            .into_response();
    }

    Json(ApproveResponse {
        success: true,
        message: report.message(),
        redirect_url: DASHBOARD_URL.to_string(),
        report,
    })
    .into_response()
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn enqueue_uploads(
    state: &AppState,
    tenant: &TenantContext,
    mut multipart: Multipart,
    mode: PersistMode,
) -> Result<(StatusCode, Json<BulkUploadResponse>), AppError> {
    let files = read_all_files(&mut multipart)
        .await
        .map_err(|e| AppError::Validation(format!("Could not read upload: {e}")))?;

    if files.is_empty() {
        return Err(AppError::Validation("No files uploaded".to_string()));
    }
    if files.len() > state.config.max_bulk_files {
        return Err(AppError::PayloadTooLarge(format!(
            "At most {} files can be uploaded at once",
            state.config.max_bulk_files
        )));
    }

    let mut report = BulkEnqueueReport::default();
    let mut accepted = Vec::with_capacity(files.len());
    for file in files {
        if file.bytes.is_empty() {
            report.reject(file.filename, "File is empty");
        } else if file.bytes.len() > state.config.max_upload_bytes {
            report.reject(
                file.filename,
                format!(
                    "File exceeds the {} byte upload limit",
                    state.config.max_upload_bytes
                ),
            );
        } else {
            accepted.push(file);
        }
    }

    enqueue_bulk(
        state.queue.as_ref(),
        tenant.company_id(),
        tenant.employee_id(),
        accepted,
        mode,
        &mut report,
    )
    .await;

    let queued = report.queued.len();
    Ok((
        StatusCode::ACCEPTED,
        Json(BulkUploadResponse {
            queued,
            message: format!("{queued} CV(s) queued for processing."),
            jobs: report.queued,
            failed: report.failed,
        }),
    ))
}

/// First file part named `name`.
async fn read_named_file(
    multipart: &mut Multipart,
    name: &str,
) -> Result<Option<UploadedFile>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(name) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        return Ok(Some(UploadedFile { filename, bytes }));
    }
    Ok(None)
}

/// Every part that carries a filename, in upload order.
async fn read_all_files(multipart: &mut Multipart) -> Result<Vec<UploadedFile>, MultipartError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await?;
        files.push(UploadedFile { filename, bytes });
    }
    Ok(files)
}

fn parse_error(status: StatusCode, error: &str, filename: &str) -> Response {
    (
        status,
        Json(ParseErrorResponse {
            error: error.to_string(),
            original_filename: filename.to_string(),
        }),
    )
        .into_response()
}
