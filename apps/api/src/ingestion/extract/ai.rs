//! AI extraction strategy: prompt a generative-text model and pull the first
//! JSON object out of whatever it answers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::prompts::{CV_EXTRACT_PROMPT, CV_EXTRACT_SYSTEM};
use super::{excerpt, ExtractedFields, ExtractionError, ExtractionMethod, FieldExtractor};
use crate::llm_client::{LlmClient, LlmError};

/// Input cap for the prompt, in characters.
pub const MAX_PROMPT_TEXT_CHARS: usize = 10_000;

/// Network seam for the AI strategy. `LlmClient` is the production backend.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str, system: &str) -> Result<String, LlmError>;
}

#[async_trait]
impl CompletionBackend for LlmClient {
    async fn complete(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        self.call_text(prompt, system).await
    }
}

pub struct RemoteAiExtractor {
    backend: Arc<dyn CompletionBackend>,
    timeout: Duration,
}

impl RemoteAiExtractor {
    pub fn new(backend: Arc<dyn CompletionBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }
}

#[async_trait]
impl FieldExtractor for RemoteAiExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Ai
    }

    async fn extract(&self, text: &str) -> Result<ExtractedFields, ExtractionError> {
        let prompt = build_prompt(text);
        let raw = tokio::time::timeout(
            self.timeout,
            self.backend.complete(&prompt, CV_EXTRACT_SYSTEM),
        )
        .await
        .map_err(|_| LlmError::Timeout(self.timeout))??;

        parse_fields(&raw)
    }
}

pub fn build_prompt(text: &str) -> String {
    CV_EXTRACT_PROMPT.replace("{cv_text}", &excerpt(text, MAX_PROMPT_TEXT_CHARS))
}

/// Decodes the first JSON object in `raw` that has the expected shape.
pub fn parse_fields(raw: &str) -> Result<ExtractedFields, ExtractionError> {
    let mut first_error = None;
    for candidate in json_object_candidates(raw) {
        match serde_json::from_str::<ExtractedFields>(candidate) {
            Ok(fields) => return Ok(fields),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(ExtractionError::MalformedJson(e)),
        None => Err(ExtractionError::NoJson),
    }
}

/// Every balanced `{...}` substring, in order of its opening brace.
/// Braces inside string literals are ignored.
fn json_object_candidates(raw: &str) -> impl Iterator<Item = &str> {
    raw.char_indices()
        .filter(|(_, c)| *c == '{')
        .filter_map(move |(start, _)| balanced_object_at(raw, start))
}

fn balanced_object_at(raw: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in raw[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&raw[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}
