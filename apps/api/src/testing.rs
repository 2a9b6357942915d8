//! In-memory doubles for the persistence, queue and network seams.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use crate::config::{Config, ServiceRole, DEFAULT_AI_API_URL, DEFAULT_AI_MODEL};
use crate::ingestion::document::{DocumentError, DocumentReader};
use crate::ingestion::extract::ai::{CompletionBackend, RemoteAiExtractor};
use crate::ingestion::extract::{
    ExtractedFields, ExtractionChain, ExtractionError, ExtractionMethod, FieldExtractor,
};
use crate::ingestion::task::IngestionJob;
use crate::ingestion::Pipeline;
use crate::llm_client::LlmError;
use crate::models::candidate::{Candidate, NewCandidate};
use crate::models::company::{Company, Employee};
use crate::queue::{JobQueue, JobRecord, QueueError};
use crate::state::AppState;
use crate::store::{CandidateStore, ResumeStore};

const AI_TIMEOUT: Duration = Duration::from_secs(30);

pub fn member(company_id: i64, employee_id: i64) -> Employee {
    Employee {
        id: employee_id,
        company_id,
        email: format!("hr{employee_id}@company{company_id}.test"),
        created_at: Utc::now(),
    }
}

// ── Candidate store ─────────────────────────────────────────────────────────

#[derive(Default)]
struct Tables {
    companies: HashMap<i64, Company>,
    employees: HashMap<i64, Employee>,
    candidates: Vec<Candidate>,
}

#[derive(Default)]
pub struct InMemoryCandidateStore {
    tables: Mutex<Tables>,
    hide_existing: AtomicBool,
}

impl InMemoryCandidateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(self, company_id: i64, employee_id: i64) -> Self {
        self.add_member(company_id, employee_id);
        self
    }

    pub fn add_member(&self, company_id: i64, employee_id: i64) {
        let mut tables = self.tables.lock().unwrap();
        tables.companies.entry(company_id).or_insert_with(|| Company {
            id: company_id,
            name: format!("Company {company_id}"),
            created_at: Utc::now(),
        });
        tables
            .employees
            .insert(employee_id, member(company_id, employee_id));
    }

    /// Makes `email_exists` miss, as if a concurrent insert landed after the check.
    pub fn hide_from_exists_checks(&self) {
        self.hide_existing.store(true, Ordering::SeqCst);
    }

    pub fn count_for(&self, company_id: i64) -> usize {
        self.tables
            .lock()
            .unwrap()
            .candidates
            .iter()
            .filter(|c| c.company_id == company_id)
            .count()
    }

    pub fn all(&self) -> Vec<Candidate> {
        self.tables.lock().unwrap().candidates.clone()
    }
}

#[async_trait]
impl CandidateStore for InMemoryCandidateStore {
    async fn find_company(&self, company_id: i64) -> Result<Option<Company>> {
        Ok(self.tables.lock().unwrap().companies.get(&company_id).cloned())
    }

    async fn find_employee(&self, employee_id: i64) -> Result<Option<Employee>> {
        Ok(self.tables.lock().unwrap().employees.get(&employee_id).cloned())
    }

    async fn email_exists(&self, company_id: i64, email: &str) -> Result<bool> {
        if self.hide_existing.load(Ordering::SeqCst) {
            return Ok(false);
        }
        Ok(self
            .tables
            .lock()
            .unwrap()
            .candidates
            .iter()
            .any(|c| c.company_id == company_id && c.email == email))
    }

    async fn insert_if_absent(&self, candidate: NewCandidate) -> Result<Option<Candidate>> {
        let mut tables = self.tables.lock().unwrap();
        let taken = tables
            .candidates
            .iter()
            .any(|c| c.company_id == candidate.company_id && c.email == candidate.email);
        if taken {
            return Ok(None);
        }
        let row = Candidate {
            id: tables.candidates.len() as i64 + 1,
            company_id: candidate.company_id,
            first_name: candidate.first_name,
            last_name: candidate.last_name,
            email: candidate.email,
            resume_key: candidate.resume_key,
            created_by: Some(candidate.created_by),
            created_at: Utc::now(),
        };
        tables.candidates.push(row.clone());
        Ok(Some(row))
    }
}

// ── Resume store ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryResumeStore {
    objects: Mutex<HashMap<String, Bytes>>,
    failing: AtomicBool,
}

impl InMemoryResumeStore {
    pub fn fail_writes(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ResumeStore for InMemoryResumeStore {
    async fn put(&self, key: &str, body: Bytes, _content_type: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("object storage unavailable");
        }
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

// ── Document readers ────────────────────────────────────────────────────────

pub enum StaticReader {
    Text(String),
    Unreadable,
    Panics,
}

impl DocumentReader for StaticReader {
    fn read_text(&self, _bytes: &[u8]) -> Result<String, DocumentError> {
        match self {
            StaticReader::Text(text) => Ok(text.clone()),
            StaticReader::Unreadable => Err(DocumentError::Unreadable("corrupt xref table".into())),
            StaticReader::Panics => panic!("decoder blew up"),
        }
    }
}

// ── Extractors and AI backends ──────────────────────────────────────────────

pub struct StaticExtractor {
    fields: ExtractedFields,
}

impl StaticExtractor {
    pub fn new(fields: ExtractedFields) -> Self {
        Self { fields }
    }
}

#[async_trait]
impl FieldExtractor for StaticExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Ai
    }

    async fn extract(&self, _text: &str) -> Result<ExtractedFields, ExtractionError> {
        Ok(self.fields.clone())
    }
}

#[derive(Default)]
pub struct FailingExtractor {
    calls: AtomicUsize,
}

impl FailingExtractor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FieldExtractor for FailingExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Ai
    }

    async fn extract(&self, _text: &str) -> Result<ExtractedFields, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ExtractionError::Llm(LlmError::Timeout(AI_TIMEOUT)))
    }
}

/// Canned completion backend. `None` as reply means every call fails.
pub struct ScriptedBackend {
    reply: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, _prompt: &str, _system: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(LlmError::Api {
                status: 503,
                message: "model overloaded".to_string(),
            }),
        }
    }
}

// ── Pipeline ────────────────────────────────────────────────────────────────

/// A `Pipeline` wired to in-memory doubles, with handles kept for assertions.
pub struct TestPipeline {
    pub pipeline: Pipeline,
    pub candidates: Arc<InMemoryCandidateStore>,
    pub resumes: Arc<InMemoryResumeStore>,
    ai: Option<Arc<ScriptedBackend>>,
}

impl TestPipeline {
    pub fn new() -> Self {
        let candidates = Arc::new(InMemoryCandidateStore::new());
        let resumes = Arc::new(InMemoryResumeStore::default());
        let pipeline = Pipeline {
            reader: Arc::new(StaticReader::Text(String::new())),
            extractor: ExtractionChain::new(None),
            candidates: candidates.clone(),
            resumes: resumes.clone(),
        };
        Self {
            pipeline,
            candidates,
            resumes,
            ai: None,
        }
    }

    pub fn with_member(self, company_id: i64, employee_id: i64) -> Self {
        self.candidates.add_member(company_id, employee_id);
        self
    }

    /// Every document reads as `text`.
    pub fn with_text(self, text: &str) -> Self {
        self.with_reader(StaticReader::Text(text.to_string()))
    }

    pub fn with_unreadable_document(self) -> Self {
        self.with_reader(StaticReader::Unreadable)
    }

    pub fn with_panicking_reader(self) -> Self {
        self.with_reader(StaticReader::Panics)
    }

    pub fn with_ai_reply(self, reply: &str) -> Self {
        self.with_ai(ScriptedBackend::replying(reply))
    }

    pub fn with_failing_ai(self) -> Self {
        self.with_ai(ScriptedBackend::failing())
    }

    pub fn ai_calls(&self) -> usize {
        self.ai.as_ref().map_or(0, |ai| ai.calls())
    }

    fn with_reader(mut self, reader: StaticReader) -> Self {
        self.pipeline.reader = Arc::new(reader);
        self
    }

    fn with_ai(mut self, backend: ScriptedBackend) -> Self {
        let backend = Arc::new(backend);
        let extractor: Arc<dyn FieldExtractor> =
            Arc::new(RemoteAiExtractor::new(backend.clone(), AI_TIMEOUT));
        self.pipeline.extractor = ExtractionChain::new(Some(extractor));
        self.ai = Some(backend);
        self
    }
}

// ── Queue ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct QueueState {
    pending: VecDeque<IngestionJob>,
    history: Vec<IngestionJob>,
    records: HashMap<Uuid, JobRecord>,
    enqueue_calls: usize,
}

/// FIFO queue that remembers everything it was handed.
#[derive(Default)]
pub struct RecordingQueue {
    state: Mutex<QueueState>,
    rejected: Vec<String>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueueing a file with this name fails.
    pub fn rejecting(mut self, filename: &str) -> Self {
        self.rejected.push(filename.to_string());
        self
    }

    pub fn enqueue_calls(&self) -> usize {
        self.state.lock().unwrap().enqueue_calls
    }

    /// Successfully enqueued jobs, in order.
    pub fn jobs(&self) -> Vec<IngestionJob> {
        self.state.lock().unwrap().history.clone()
    }

    pub async fn wait_until_drained(&self) {
        while !self.state.lock().unwrap().pending.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn enqueue(&self, job: &IngestionJob) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap();
        state.enqueue_calls += 1;
        if self.rejected.contains(&job.filename) {
            return Err(QueueError::Redis(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "connection refused",
            ))));
        }
        state.pending.push_back(job.clone());
        state.history.push(job.clone());
        state.records.insert(job.job_id, JobRecord::pending(job));
        Ok(())
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<IngestionJob>, QueueError> {
        let next = self.state.lock().unwrap().pending.pop_front();
        if next.is_none() {
            tokio::time::sleep(wait.min(Duration::from_millis(10))).await;
        }
        Ok(next)
    }

    async fn record_result(&self, record: &JobRecord) -> Result<(), QueueError> {
        self.state
            .lock()
            .unwrap()
            .records
            .insert(record.job_id, record.clone());
        Ok(())
    }

    async fn fetch_result(&self, job_id: Uuid) -> Result<Option<JobRecord>, QueueError> {
        Ok(self.state.lock().unwrap().records.get(&job_id).cloned())
    }
}

// ── App state ───────────────────────────────────────────────────────────────

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/hirehub_test".to_string(),
        redis_url: "redis://localhost:6379".to_string(),
        s3_bucket: "hirehub-test".to_string(),
        s3_endpoint: "http://localhost:9000".to_string(),
        aws_access_key_id: "test".to_string(),
        aws_secret_access_key: "test".to_string(),
        ai_api_url: DEFAULT_AI_API_URL.to_string(),
        ai_api_key: None,
        ai_model: DEFAULT_AI_MODEL.to_string(),
        ai_timeout_secs: 30,
        max_upload_bytes: 1024,
        max_pdf_pages: 50,
        max_bulk_files: 3,
        worker_concurrency: 1,
        job_result_ttl_secs: 60,
        service_role: ServiceRole::All,
        port: 0,
        rust_log: "debug".to_string(),
    }
}

pub fn test_state(t: &TestPipeline, queue: Arc<RecordingQueue>) -> AppState {
    AppState {
        pipeline: t.pipeline.clone(),
        queue,
        config: test_config(),
    }
}
