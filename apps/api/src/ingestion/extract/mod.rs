//! Structured-Data Extractor: resume text → `{first_name, last_name, email}`.
//!
//! Two interchangeable strategies implement [`FieldExtractor`]:
//! [`ai::RemoteAiExtractor`] and [`pattern::PatternExtractor`]. The
//! [`ExtractionChain`] runs them in a fixed order and owns the best-effort policy.

pub mod ai;
pub mod pattern;
pub mod prompts;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm_client::LlmError;
use crate::models::candidate::normalize_email;

/// Placeholder stored when a name could not be extracted.
pub const UNKNOWN_NAME: &str = "Unknown";

const EXCERPT_CHARS: usize = 280;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Ai,
    Pattern,
}

/// Raw strategy output. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFields {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Strategy-agnostic result handed to the rest of the pipeline.
///
/// Names are never empty; `email` is normalized when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub source_text_excerpt: String,
    pub extraction_method: ExtractionMethod,
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("AI call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("AI response contained no JSON object")]
    NoJson,

    #[error("AI response JSON was malformed: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

/// One way of turning resume text into fields.
#[async_trait]
pub trait FieldExtractor: Send + Sync {
    fn method(&self) -> ExtractionMethod;

    async fn extract(&self, text: &str) -> Result<ExtractedFields, ExtractionError>;
}

/// Fixed-order fallback chain. The first strategy to return `Ok` wins; an
/// `Err` moves on to the next one. The pattern strategy sits last and never fails.
#[derive(Clone)]
pub struct ExtractionChain {
    strategies: Vec<Arc<dyn FieldExtractor>>,
}

impl ExtractionChain {
    /// `ai` is tried first when configured, pattern matching always closes the chain.
    pub fn new(ai: Option<Arc<dyn FieldExtractor>>) -> Self {
        let mut strategies = Vec::with_capacity(2);
        if let Some(ai) = ai {
            strategies.push(ai);
        }
        strategies.push(Arc::new(pattern::PatternExtractor::new()) as Arc<dyn FieldExtractor>);
        Self { strategies }
    }

    /// Runs the chain over non-empty text.
    pub async fn extract(&self, text: &str) -> ExtractionResult {
        for strategy in &self.strategies {
            match strategy.extract(text).await {
                Ok(fields) => {
                    debug!(method = ?strategy.method(), "Extraction strategy succeeded");
                    return finalize(fields, strategy.method(), text);
                }
                Err(e) => {
                    warn!(method = ?strategy.method(), "Extraction strategy failed, falling back: {e}");
                }
            }
        }

        // Only reachable with an empty chain, which `new` never builds.
        finalize(ExtractedFields::default(), ExtractionMethod::Pattern, text)
    }
}

fn finalize(fields: ExtractedFields, method: ExtractionMethod, text: &str) -> ExtractionResult {
    ExtractionResult {
        first_name: name_or_unknown(fields.first_name),
        last_name: name_or_unknown(fields.last_name),
        email: fields
            .email
            .map(|e| normalize_email(&e))
            .filter(|e| pattern::is_email_shaped(e)),
        source_text_excerpt: excerpt(text, EXCERPT_CHARS),
        extraction_method: method,
    }
}

/// Blank or missing names become the `Unknown` placeholder.
pub fn name_or_unknown(name: Option<String>) -> String {
    match name {
        Some(n) if !n.trim().is_empty() => n.trim().to_string(),
        _ => UNKNOWN_NAME.to_string(),
    }
}

/// First `max_chars` characters, cut on a char boundary.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
