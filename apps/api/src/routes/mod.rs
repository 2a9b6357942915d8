pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::ingestion::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config.max_request_bytes());

    Router::new()
        .route("/health", get(health::health_handler))
        // CV ingestion
        .route("/api/v1/cv/parse", post(handlers::handle_parse_cv))
        .route("/api/v1/cv/bulk-upload", post(handlers::handle_bulk_upload))
        .route(
            "/api/v1/cv/review-upload",
            post(handlers::handle_review_upload),
        )
        .route("/api/v1/cv/jobs/:job_id", get(handlers::handle_job_status))
        // Review gate
        .route(
            "/api/v1/candidates/approve",
            post(handlers::handle_approve_candidates),
        )
        .layer(body_limit)
        .with_state(state)
}
