//! Persistence seams. Handlers and workers only see these traits; `AppState`
//! carries the Postgres and S3 implementations.

pub mod candidates;
pub mod resumes;

pub use candidates::{CandidateStore, PgCandidateStore};
pub use resumes::{ResumeStore, S3ResumeStore};
