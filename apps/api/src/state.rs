use std::sync::Arc;

use crate::config::Config;
use crate::ingestion::Pipeline;
use crate::queue::JobQueue;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Extraction and persistence collaborators, shared with the in-process workers.
    pub pipeline: Pipeline,
    /// Producer side of the ingestion queue.
    pub queue: Arc<dyn JobQueue>,
    pub config: Config,
}
