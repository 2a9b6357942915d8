mod config;
mod db;
mod errors;
mod ingestion;
mod llm_client;
mod models;
mod queue;
mod routes;
mod state;
mod store;
mod tenancy;
#[cfg(test)]
mod testing;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::db::create_pool;
use crate::ingestion::document::PdfReader;
use crate::ingestion::extract::ai::RemoteAiExtractor;
use crate::ingestion::extract::{ExtractionChain, FieldExtractor};
use crate::ingestion::worker::spawn_workers;
use crate::ingestion::Pipeline;
use crate::llm_client::LlmClient;
use crate::queue::{JobQueue, RedisJobQueue};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{PgCandidateStore, S3ResumeStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting HireHub API v{} (role: {:?})",
        env!("CARGO_PKG_VERSION"),
        config.service_role
    );

    // Initialize PostgreSQL (runs pending migrations)
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    let pipeline = Pipeline {
        reader: Arc::new(PdfReader::new(config.max_pdf_pages)),
        extractor: ExtractionChain::new(build_ai_extractor(&config)?),
        candidates: Arc::new(PgCandidateStore::new(db)),
        resumes: Arc::new(S3ResumeStore::new(s3, config.s3_bucket.clone())),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {e}");
        }
        info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    let mut workers = Vec::new();
    if config.service_role.runs_workers() {
        let count = config.worker_concurrency.max(1);
        let mut queues: Vec<Arc<dyn JobQueue>> = Vec::with_capacity(count);
        for _ in 0..count {
            queues.push(Arc::new(
                RedisJobQueue::connect(&redis, config.job_result_ttl_secs).await?,
            ));
        }
        info!("Starting {count} ingestion worker(s)");
        workers = spawn_workers(queues, pipeline.clone(), shutdown_rx.clone());
    }

    if config.service_role.runs_api() {
        let queue = Arc::new(RedisJobQueue::connect(&redis, config.job_result_ttl_secs).await?);

        // Build app state
        let state = AppState {
            pipeline,
            queue,
            config: config.clone(),
        };

        // Build router
        let app = build_router(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()); // TODO: restrict origins to the portal domain

        let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
        info!("Listening on {addr}");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let mut api_shutdown = shutdown_rx.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = api_shutdown.changed().await;
            })
            .await?;
    }

    // Workers finish the job in hand before exiting.
    for worker in workers {
        if let Err(e) = worker.await {
            warn!("Ingestion worker exited abnormally: {e}");
        }
    }

    Ok(())
}

/// The AI strategy is only part of the chain when an API key is configured.
fn build_ai_extractor(config: &Config) -> Result<Option<Arc<dyn FieldExtractor>>> {
    let Some(api_key) = config.ai_api_key.clone() else {
        info!("AI_API_KEY not set, using pattern extraction only");
        return Ok(None);
    };

    let timeout = Duration::from_secs(config.ai_timeout_secs);
    let llm = LlmClient::new(
        config.ai_api_url.clone(),
        api_key,
        config.ai_model.clone(),
        timeout,
    )?;
    info!("LLM client initialized (model: {})", llm.model());

    let extractor: Arc<dyn FieldExtractor> =
        Arc::new(RemoteAiExtractor::new(Arc::new(llm), timeout));
    Ok(Some(extractor))
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "hirehub-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
