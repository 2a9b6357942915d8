//! Document text extraction: turns an uploaded resume into raw text.
//!
//! Whole-document extraction goes through `pdf-extract`. When that fails the
//! reader walks the pages one by one and keeps whatever text it can; a page
//! that cannot be decoded contributes nothing instead of sinking the file.

use std::panic::{catch_unwind, AssertUnwindSafe};

use thiserror::Error;
use tracing::{debug, warn};

const PDF_MAGIC: &[u8] = b"%PDF";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("file is not a PDF document")]
    NotPdf,

    #[error("document has {pages} pages, more than the allowed {max}")]
    TooManyPages { pages: usize, max: usize },

    #[error("document could not be parsed: {0}")]
    Unreadable(String),
}

/// Converts document bytes to plain text.
pub trait DocumentReader: Send + Sync {
    fn read_text(&self, bytes: &[u8]) -> Result<String, DocumentError>;
}

/// PDF reader backed by `pdf-extract`, with a lopdf per-page fallback.
#[derive(Debug, Clone)]
pub struct PdfReader {
    max_pages: usize,
}

impl PdfReader {
    pub fn new(max_pages: usize) -> Self {
        Self { max_pages }
    }
}

impl DocumentReader for PdfReader {
    fn read_text(&self, bytes: &[u8]) -> Result<String, DocumentError> {
        if !bytes.starts_with(PDF_MAGIC) {
            return Err(DocumentError::NotPdf);
        }

        let document = catch_unwind(AssertUnwindSafe(|| pdf_extract::Document::load_mem(bytes)))
            .map_err(|_| DocumentError::Unreadable("parser panicked".to_string()))?
            .map_err(|e| DocumentError::Unreadable(e.to_string()))?;
        let pages = document.get_pages();
        if pages.len() > self.max_pages {
            return Err(DocumentError::TooManyPages {
                pages: pages.len(),
                max: self.max_pages,
            });
        }

        // pdf-extract panics on some malformed font and encoding tables.
        let whole = catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem(bytes)
        }));
        match whole {
            Ok(Ok(text)) => return Ok(text),
            Ok(Err(e)) => warn!("Whole-document PDF extraction failed, trying per page: {e}"),
            Err(_) => warn!("PDF extractor panicked, trying per page"),
        }

        Ok(extract_per_page(&document))
    }
}

/// Page-by-page lopdf extraction. Pages that fail to decode are skipped.
fn extract_per_page(document: &pdf_extract::Document) -> String {
    let mut text = String::new();
    for page_number in document.get_pages().keys() {
        let page = catch_unwind(AssertUnwindSafe(|| document.extract_text(&[*page_number])));
        match page {
            Ok(Ok(page_text)) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Ok(Err(e)) => debug!("Skipping unreadable page {page_number}: {e}"),
            Err(_) => debug!("Skipping page {page_number} after extractor panic"),
        }
    }
    text
}

/// True when the extracted text has anything worth sending to a strategy.
pub fn has_usable_text(text: &str) -> bool {
    !text.trim().is_empty()
}
