//! Ingestion task: one uploaded resume in, one tagged outcome out.
//!
//! `parse_document` is the extraction core shared by the synchronous parse
//! endpoint and both job modes. Persistence is a separate call made only for
//! `PersistMode::Immediate`. `run_job` is the outer boundary: whatever goes
//! wrong inside it comes back as `IngestionOutcome::InternalError`.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::ingestion::document::has_usable_text;
use crate::ingestion::extract::ExtractionResult;
use crate::ingestion::persist::{persist_candidate, CandidateDraft, PersistOutcome, ResumeFile};
use crate::ingestion::Pipeline;
use crate::tenancy::resolve_member;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistMode {
    /// Create the candidate as soon as extraction succeeds.
    Immediate,
    /// Return the extraction for human review; write nothing.
    ReviewOnly,
}

/// Queue message. Self-contained: the worker re-fetches tenant records by ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionJob {
    pub job_id: Uuid,
    /// Base64 (standard alphabet) of the raw file bytes.
    pub encoded_file: String,
    pub filename: String,
    pub company_id: i64,
    pub employee_id: i64,
    pub mode: PersistMode,
    #[serde(default = "Utc::now")]
    pub enqueued_at: DateTime<Utc>,
}

impl IngestionJob {
    pub fn new(
        bytes: &[u8],
        filename: impl Into<String>,
        company_id: i64,
        employee_id: i64,
        mode: PersistMode,
    ) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            encoded_file: STANDARD.encode(bytes),
            filename: filename.into(),
            company_id,
            employee_id,
            mode,
            enqueued_at: Utc::now(),
        }
    }

    pub fn decode_file(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.encoded_file.as_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestionOutcome {
    Created {
        filename: String,
        candidate_id: i64,
        email: String,
    },
    Parsed {
        filename: String,
        result: ExtractionResult,
    },
    Duplicate {
        filename: String,
        email: String,
    },
    NoText {
        filename: String,
    },
    NoEmail {
        filename: String,
    },
    InternalError {
        filename: String,
        message: String,
    },
}

impl IngestionOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            IngestionOutcome::Created { .. } => "created",
            IngestionOutcome::Parsed { .. } => "parsed",
            IngestionOutcome::Duplicate { .. } => "duplicate",
            IngestionOutcome::NoText { .. } => "no_text",
            IngestionOutcome::NoEmail { .. } => "no_email",
            IngestionOutcome::InternalError { .. } => "internal_error",
        }
    }

    pub fn internal_error(filename: impl Into<String>, message: impl Into<String>) -> Self {
        IngestionOutcome::InternalError {
            filename: filename.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseFailure {
    #[error("Could not extract any text from the document")]
    NoText,

    #[error("Could not find an email address in the document")]
    NoEmail,

    #[error("Internal error while parsing: {0:#}")]
    Internal(#[from] anyhow::Error),
}

/// An extraction that has passed the mandatory-email check.
#[derive(Debug, Clone)]
pub struct ParsedCv {
    pub result: ExtractionResult,
    pub email: String,
}

impl ParsedCv {
    pub fn draft(&self) -> CandidateDraft {
        CandidateDraft {
            first_name: self.result.first_name.clone(),
            last_name: self.result.last_name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Text extraction, then the strategy chain, then the email requirement.
/// No strategy is called when the document has no usable text.
pub async fn parse_document(
    pipeline: &Pipeline,
    filename: &str,
    bytes: Bytes,
) -> Result<ParsedCv, ParseFailure> {
    let reader = pipeline.reader.clone();
    let read = tokio::task::spawn_blocking(move || reader.read_text(&bytes))
        .await
        .context("Document reader task failed")?;

    let text = match read {
        Ok(text) if has_usable_text(&text) => text,
        Ok(_) => {
            debug!(filename, "Document produced no text");
            return Err(ParseFailure::NoText);
        }
        Err(e) => {
            info!(filename, "Document could not be read: {e}");
            return Err(ParseFailure::NoText);
        }
    };

    let result = pipeline.extractor.extract(&text).await;
    match result.email.clone() {
        Some(email) => Ok(ParsedCv { result, email }),
        None => Err(ParseFailure::NoEmail),
    }
}

/// Executes one queued job. Never returns an error and never panics on bad input.
pub async fn run_job(pipeline: &Pipeline, job: &IngestionJob) -> IngestionOutcome {
    match execute(pipeline, job).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(
                job_id = %job.job_id,
                company_id = job.company_id,
                filename = %job.filename,
                "Ingestion job failed: {e:#}"
            );
            IngestionOutcome::internal_error(&job.filename, format!("{e:#}"))
        }
    }
}

async fn execute(pipeline: &Pipeline, job: &IngestionJob) -> Result<IngestionOutcome> {
    let bytes = Bytes::from(
        job.decode_file()
            .context("Encoded file is not valid base64")?,
    );
    let employee = resolve_member(pipeline.candidates.as_ref(), job.company_id, job.employee_id)
        .await
        .context("Could not resolve the uploading employee")?;

    let filename = job.filename.clone();
    let parsed = match parse_document(pipeline, &job.filename, bytes.clone()).await {
        Ok(parsed) => parsed,
        Err(ParseFailure::NoText) => return Ok(IngestionOutcome::NoText { filename }),
        Err(ParseFailure::NoEmail) => return Ok(IngestionOutcome::NoEmail { filename }),
        Err(ParseFailure::Internal(e)) => return Err(e),
    };

    if job.mode == PersistMode::ReviewOnly {
        return Ok(IngestionOutcome::Parsed {
            filename,
            result: parsed.result,
        });
    }

    let file = ResumeFile {
        filename: job.filename.clone(),
        bytes,
    };
    let outcome = persist_candidate(pipeline, &employee, parsed.draft(), Some(file)).await?;
    Ok(match outcome {
        PersistOutcome::Created(candidate) => IngestionOutcome::Created {
            filename,
            candidate_id: candidate.id,
            email: candidate.email,
        },
        PersistOutcome::Duplicate => IngestionOutcome::Duplicate {
            filename,
            email: parsed.email,
        },
    })
}
