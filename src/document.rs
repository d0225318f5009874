//! Document payloads and extraction output types.

use crate::error::ExtractionError;
use serde::{Deserialize, Serialize};

/// Magic bytes every PDF starts with.
const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// An uploaded document: an opaque byte payload plus an optional password.
///
/// Lives only for the duration of one extraction call and is consumed by it.
#[derive(Clone)]
pub struct Document {
    bytes: Vec<u8>,
    password: Option<String>,
}

impl Document {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Reject payloads that cannot possibly be a PDF before any rendering.
    pub fn validate(&self) -> Result<(), ExtractionError> {
        if self.bytes.is_empty() {
            return Err(ExtractionError::EmptyDocument);
        }
        if !self.bytes.starts_with(PDF_MAGIC) {
            let n = self.bytes.len().min(PDF_MAGIC.len());
            return Err(ExtractionError::NotAPdf {
                magic: self.bytes[..n].to_vec(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("len", &self.bytes.len())
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Recognised text of one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Cleaned single-line text; empty for blank pages.
    pub text: String,
    /// Wall-clock time spent recognising this page.
    pub duration_ms: u64,
}

/// Timing and size statistics for one extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_pages: usize,
    /// Pages whose recognised text is empty.
    pub empty_pages: usize,
    pub total_chars: usize,
    pub render_duration_ms: u64,
    pub recognition_duration_ms: u64,
    pub total_duration_ms: u64,
    /// Name of the recogniser that produced the text.
    pub recognizer: String,
}

/// The full text of a document, page by page, in original page order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedText {
    /// Every page's text followed by `\n`, in page order.
    pub text: String,
    pub pages: Vec<PageText>,
    pub stats: ExtractionStats,
}

impl ExtractedText {
    /// Assemble from per-page results that are already sorted by page number.
    pub fn from_pages(pages: Vec<PageText>, mut stats: ExtractionStats) -> Self {
        let mut text = String::with_capacity(pages.iter().map(|p| p.text.len() + 1).sum());
        for page in &pages {
            text.push_str(&page.text);
            text.push('\n');
        }
        stats.total_pages = pages.len();
        stats.empty_pages = pages.iter().filter(|p| p.text.is_empty()).count();
        stats.total_chars = text.chars().count();
        Self { text, pages, stats }
    }

    /// One segment per page, in page order; blank pages yield `""`.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.text.split_terminator('\n')
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// True when no page produced any text.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
