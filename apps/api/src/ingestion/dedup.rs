//! Candidate Deduplication Gate, scoped per tenant.
//!
//! `already_exists` is the cheap advisory check run before any file is
//! uploaded. The authoritative guard is `insert_if_absent`, which relies on
//! the `(company_id, email)` unique constraint so two concurrent ingestions of
//! the same address cannot both create a row.

use anyhow::Result;

use crate::models::candidate::{normalize_email, Candidate, NewCandidate};
use crate::store::CandidateStore;

pub async fn already_exists(
    store: &dyn CandidateStore,
    company_id: i64,
    email: &str,
) -> Result<bool> {
    store
        .email_exists(company_id, &normalize_email(email))
        .await
}

/// Returns `None` when the tenant already has a candidate with this email.
pub async fn insert_if_absent(
    store: &dyn CandidateStore,
    mut candidate: NewCandidate,
) -> Result<Option<Candidate>> {
    candidate.email = normalize_email(&candidate.email);
    store.insert_if_absent(candidate).await
}
