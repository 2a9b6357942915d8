//! CV ingestion pipeline.
//!
//! ```text
//! upload ─► bulk::enqueue_bulk ─► JobQueue ─► worker ─► task::run_job
//!                                                  │
//!     document (text) ─► extract (AI → pattern) ─► dedup ─► persist
//!                                                  │
//!            review-only results ─► review::approve_candidates ─► persist
//! ```

pub mod bulk;
pub mod dedup;
pub mod document;
pub mod extract;
pub mod handlers;
pub mod persist;
pub mod review;
pub mod task;
pub mod worker;

use std::sync::Arc;

use crate::ingestion::document::DocumentReader;
use crate::ingestion::extract::ExtractionChain;
use crate::store::{CandidateStore, ResumeStore};

/// Everything one ingestion needs. Cheap to clone; each worker holds its own copy.
#[derive(Clone)]
pub struct Pipeline {
    pub reader: Arc<dyn DocumentReader>,
    pub extractor: ExtractionChain,
    pub candidates: Arc<dyn CandidateStore>,
    pub resumes: Arc<dyn ResumeStore>,
}
