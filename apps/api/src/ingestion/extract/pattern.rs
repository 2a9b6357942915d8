//! Pattern extraction strategy: regular expressions over the raw text.
//! Deterministic, offline, and never fails.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use super::{ExtractedFields, ExtractionError, ExtractionMethod, FieldExtractor};

const EMAIL_PATTERN: &str = r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}";
const CAPITALIZED_WORD_PATTERN: &str = r"\b[A-Z][a-z]+\b";

/// Capitalized words that start resumes and contact lines but are never names.
const NON_NAME_WORDS: &[&str] = &[
    "About",
    "Address",
    "Contact",
    "Curriculum",
    "Dear",
    "Details",
    "Dr",
    "Education",
    "Email",
    "Experience",
    "Mail",
    "Mobile",
    "Mr",
    "Mrs",
    "Ms",
    "Name",
    "Objective",
    "Page",
    "Personal",
    "Phone",
    "Profile",
    "Resume",
    "Skills",
    "Summary",
    "Tel",
    "The",
    "Vitae",
];

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern is valid"))
}

fn capitalized_word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(CAPITALIZED_WORD_PATTERN).expect("capitalized word pattern is valid")
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PatternExtractor;

impl PatternExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FieldExtractor for PatternExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Pattern
    }

    async fn extract(&self, text: &str) -> Result<ExtractedFields, ExtractionError> {
        Ok(extract_with_patterns(text))
    }
}

pub fn extract_with_patterns(text: &str) -> ExtractedFields {
    let email = find_email(text);
    let (first_name, last_name) = match find_name(text) {
        Some((first, last)) => (Some(first), Some(last)),
        None => (None, None),
    };
    ExtractedFields {
        first_name,
        last_name,
        email,
    }
}

/// First email-shaped substring.
pub fn find_email(text: &str) -> Option<String> {
    email_regex()
        .find(text)
        .map(|m| m.as_str().trim_end_matches('.').to_string())
}

/// True when the whole of `candidate` is one email address.
pub fn is_email_shaped(candidate: &str) -> bool {
    email_regex()
        .find(candidate)
        .is_some_and(|m| m.start() == 0 && m.end() == candidate.len())
}

/// First pair of adjacent capitalized words separated only by spaces or tabs,
/// skipping heading and salutation words.
pub fn find_name(text: &str) -> Option<(String, String)> {
    let words: Vec<_> = capitalized_word_regex().find_iter(text).collect();

    words.windows(2).find_map(|pair| {
        let (first, last) = (pair[0], pair[1]);
        let gap = &text[first.end()..last.start()];
        let adjacent = !gap.is_empty() && gap.chars().all(|c| c == ' ' || c == '\t');
        if !adjacent || is_non_name(first.as_str()) || is_non_name(last.as_str()) {
            return None;
        }
        Some((first.as_str().to_string(), last.as_str().to_string()))
    })
}

fn is_non_name(word: &str) -> bool {
    NON_NAME_WORDS.contains(&word)
}
