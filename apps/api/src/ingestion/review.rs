//! Review/Approval Gate: persists human-approved proposals.
//!
//! Each proposal is handled on its own and re-checked against the dedup gate;
//! the caller is not trusted to have deduplicated.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::ingestion::extract::name_or_unknown;
use crate::ingestion::persist::{persist_candidate, CandidateDraft, PersistOutcome, ResumeFile};
use crate::ingestion::Pipeline;
use crate::models::candidate::normalize_email;
use crate::models::company::Employee;

const DEFAULT_RESUME_FILENAME: &str = "resume.pdf";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateProposal {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub file_content_b64: Option<String>,
    #[serde(default)]
    pub original_filename: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApprovalReport {
    pub created: usize,
    pub duplicates: usize,
    /// Proposals without an email.
    pub skipped: usize,
    /// Proposals that hit a storage or database error.
    pub failed: usize,
}

impl ApprovalReport {
    pub fn message(&self) -> String {
        format!(
            "{} candidate(s) saved, {} duplicate(s) skipped, {} without email skipped, {} failed.",
            self.created, self.duplicates, self.skipped, self.failed
        )
    }
}

pub async fn approve_candidates(
    pipeline: &Pipeline,
    employee: &Employee,
    proposals: Vec<CandidateProposal>,
) -> ApprovalReport {
    let mut report = ApprovalReport::default();

    for proposal in proposals {
        let email = proposal
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty());
        let Some(email) = email else {
            report.skipped += 1;
            continue;
        };

        let draft = CandidateDraft {
            first_name: name_or_unknown(proposal.first_name),
            last_name: name_or_unknown(proposal.last_name),
            email,
        };
        let file = decode_resume(proposal.file_content_b64, proposal.original_filename);

        match persist_candidate(pipeline, employee, draft, file).await {
            Ok(PersistOutcome::Created(_)) => report.created += 1,
            Ok(PersistOutcome::Duplicate) => report.duplicates += 1,
            Err(e) => {
                error!(company_id = employee.company_id, "Failed to save approved candidate: {e:#}");
                report.failed += 1;
            }
        }
    }

    report
}

/// A proposal whose file cannot be decoded is still saved, without a resume.
fn decode_resume(encoded: Option<String>, filename: Option<String>) -> Option<ResumeFile> {
    let encoded = encoded.filter(|e| !e.trim().is_empty())?;
    match STANDARD.decode(encoded.trim().as_bytes()) {
        Ok(bytes) => Some(ResumeFile {
            filename: filename
                .filter(|f| !f.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_RESUME_FILENAME.to_string()),
            bytes: Bytes::from(bytes),
        }),
        Err(e) => {
            warn!("Ignoring undecodable resume attachment: {e}");
            None
        }
    }
}
