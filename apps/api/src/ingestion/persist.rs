//! Explicit persistence step shared by the ingestion task and the review gate.

use anyhow::{Context, Result};
use bytes::Bytes;
use tracing::{info, warn};

use crate::ingestion::{dedup, Pipeline};
use crate::models::candidate::{normalize_email, Candidate, NewCandidate};
use crate::models::company::Employee;
use crate::store::resumes::{content_type_for, resume_key};

/// Fields of a candidate about to be written. Names must already be non-empty.
#[derive(Debug, Clone)]
pub struct CandidateDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Original upload kept as the candidate's resume.
#[derive(Debug, Clone)]
pub struct ResumeFile {
    pub filename: String,
    pub bytes: Bytes,
}

#[derive(Debug)]
pub enum PersistOutcome {
    Created(Candidate),
    Duplicate,
}

/// Dedup check, resume upload, then the atomic insert.
///
/// Resume files of duplicates are not kept: nothing is uploaded when the
/// advisory check already finds the email, and the upload is removed again
/// when the insert loses a race.
pub async fn persist_candidate(
    pipeline: &Pipeline,
    employee: &Employee,
    draft: CandidateDraft,
    file: Option<ResumeFile>,
) -> Result<PersistOutcome> {
    let company_id = employee.company_id;
    let email = normalize_email(&draft.email);

    if dedup::already_exists(pipeline.candidates.as_ref(), company_id, &email).await? {
        info!(company_id, "Candidate email already present, skipping");
        return Ok(PersistOutcome::Duplicate);
    }

    let resume_key = match file {
        Some(file) => {
            let key = resume_key(company_id, &file.filename);
            pipeline
                .resumes
                .put(&key, file.bytes, content_type_for(&file.filename))
                .await
                .context("Failed to store resume file")?;
            Some(key)
        }
        None => None,
    };

    let inserted = dedup::insert_if_absent(
        pipeline.candidates.as_ref(),
        NewCandidate {
            company_id,
            first_name: draft.first_name,
            last_name: draft.last_name,
            email,
            resume_key: resume_key.clone(),
            created_by: employee.id,
        },
    )
    .await;

    match inserted {
        Ok(Some(candidate)) => {
            info!(
                company_id,
                candidate_id = candidate.id,
                "Created candidate"
            );
            Ok(PersistOutcome::Created(candidate))
        }
        Ok(None) => {
            discard_resume(pipeline, resume_key.as_deref()).await;
            info!(company_id, "Candidate email taken concurrently, skipping");
            Ok(PersistOutcome::Duplicate)
        }
        Err(e) => {
            discard_resume(pipeline, resume_key.as_deref()).await;
            Err(e.context("Failed to insert candidate"))
        }
    }
}

async fn discard_resume(pipeline: &Pipeline, key: Option<&str>) {
    if let Some(key) = key {
        if let Err(e) = pipeline.resumes.delete(key).await {
            warn!("Failed to remove orphaned resume {key}: {e:#}");
        }
    }
}
