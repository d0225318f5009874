//! Error types for the edgequake-docqa library.
//!
//! Each pipeline stage owns one error type so callers can tell the stages
//! apart without string matching:
//!
//! * [`ExtractionError`]: the document itself is unusable (not a PDF,
//!   corrupt, encrypted) or could not be rasterised.
//! * [`RecognitionError`]: optical recognition failed on one page. The whole
//!   extraction is aborted; no partial text is ever returned.
//! * [`ContextError`]: invalid context-preparation parameters.
//! * [`ValidationError`]: a malformed QA request, rejected before inference.
//! * [`InferenceError`]: the answer engine could not be invoked.
//!
//! [`ExtractError`] and [`ServiceError`] are the unions returned by
//! [`crate::extract::TextExtractor::extract`] and
//! [`crate::service::QaService::handle`]. [`DocQaError`] covers fatal setup
//! failures (bad configuration, model initialisation at startup) and wraps
//! the above for the one-call convenience functions.
//!
//! "No answer found" is **not** an error: it is the
//! [`crate::inference::QaAnswer::NotFound`] result.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The document payload is unusable or could not be rasterised.
#[derive(Debug, Error)]
pub enum ExtractionError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The payload contains no bytes at all.
    #[error("Document is empty (0 bytes)")]
    EmptyDocument,

    /// The payload was read, but is not a PDF.
    #[error("Document is not a valid PDF. First bytes: {magic:?}")]
    NotAPdf { magic: Vec<u8> },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF is corrupt: {detail}")]
    CorruptDocument { detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired,

    /// A password was provided but it is wrong.
    #[error("Wrong password for encrypted PDF")]
    WrongPassword,

    /// The PDF parsed but contains no pages.
    #[error("PDF contains no pages")]
    NoPages,

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install pdfium system-wide or set PDFIUM_LIB_PATH=/path/to/libpdfium.\n\
Prebuilt binaries: https://github.com/bblanchon/pdfium-binaries\n"
    )]
    PdfiumUnavailable(String),

    /// Unexpected internal error (e.g. a blocking task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which step of per-page recognition failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionStage {
    /// Preparing the page image for the engine (PNG encoding, temp file).
    Encode,
    /// The recognition engine itself (process spawn, exit status, API call).
    Engine,
    /// Interpreting the engine's output.
    Decode,
}

impl fmt::Display for RecognitionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecognitionStage::Encode => "encode",
            RecognitionStage::Engine => "engine",
            RecognitionStage::Decode => "decode",
        };
        f.write_str(s)
    }
}

/// Optical recognition failed on a single page. Aborts the whole extraction.
#[derive(Debug, Clone, Error)]
#[error("Recognition failed on page {page} ({stage} stage): {detail}")]
pub struct RecognitionError {
    /// 1-indexed page number.
    pub page: usize,
    pub stage: RecognitionStage,
    pub detail: String,
}

impl RecognitionError {
    pub fn new(page: usize, stage: RecognitionStage, detail: impl Into<String>) -> Self {
        Self {
            page,
            stage,
            detail: detail.into(),
        }
    }
}

/// Everything [`crate::extract::TextExtractor::extract`] can fail with.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Recognition(#[from] RecognitionError),
}

/// Invalid context-preparation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("max_length must be greater than zero")]
    InvalidMaxLength,
}

/// A malformed QA request. Detected before any inference work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("empty context")]
    EmptyContext,

    #[error("empty question")]
    EmptyQuestion,
}

/// The answer engine could not be invoked.
///
/// Fatal for the single request that hit it; other concurrent requests are
/// unaffected.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The model backend is unreachable or not configured.
    #[error("Inference model '{model}' is unavailable: {detail}")]
    ModelUnavailable { model: String, detail: String },

    /// The inference server answered with a non-success HTTP status.
    #[error("Inference server returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The inference call exceeded its timeout.
    #[error("Inference call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The model answered, but the response could not be interpreted.
    #[error("Malformed inference response: {0}")]
    MalformedResponse(String),

    /// An LLM provider call failed after all retries.
    #[error("LLM provider call failed after {retries} retries: {detail}")]
    ProviderFailed { retries: u32, detail: String },
}

/// Whose fault a [`ServiceError`] is, for transport-layer status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Fault {
    Client,
    Server,
}

/// Everything [`crate::service::QaService::handle`] can fail with.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("ValidationError: {0}")]
    Validation(#[from] ValidationError),

    #[error("InferenceError: {0}")]
    Inference(#[from] InferenceError),

    /// The service's own context limit is unusable.
    #[error("ContextError: {0}")]
    Context(#[from] ContextError),
}

impl ServiceError {
    /// Validation problems are the caller's fault; everything else is ours.
    pub fn fault(&self) -> Fault {
        match self {
            ServiceError::Validation(_) => Fault::Client,
            ServiceError::Inference(_) | ServiceError::Context(_) => Fault::Server,
        }
    }

    /// Structured description suitable for a response body.
    pub fn body(&self) -> ErrorBody {
        let (kind, message) = match self {
            ServiceError::Validation(e) => ("validation", e.to_string()),
            ServiceError::Inference(e) => ("inference", e.to_string()),
            ServiceError::Context(e) => ("context", e.to_string()),
        };
        ErrorBody {
            kind: kind.to_string(),
            fault: self.fault(),
            message,
        }
    }
}

/// Serialisable failure description handed to a transport collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub kind: String,
    pub fault: Fault,
    pub message: String,
}

/// Fatal setup errors: the pipeline cannot be constructed at all.
#[derive(Debug, Error)]
pub enum DocQaError {
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The QA model could not be initialised at startup.
    #[error("Failed to initialise inference model '{model}': {detail}")]
    ModelInit { model: String, detail: String },

    /// Text extraction failed (convenience entry points only).
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Context(#[from] ContextError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_match_contract() {
        assert_eq!(ValidationError::EmptyContext.to_string(), "empty context");
        assert_eq!(ValidationError::EmptyQuestion.to_string(), "empty question");
        let e = ServiceError::from(ValidationError::EmptyContext);
        assert_eq!(e.to_string(), "ValidationError: empty context");
    }

    #[test]
    fn recognition_error_names_page_and_stage() {
        let e = RecognitionError::new(2, RecognitionStage::Engine, "tesseract exited with 1");
        let msg = e.to_string();
        assert!(msg.contains("page 2"), "got: {msg}");
        assert!(msg.contains("engine stage"), "got: {msg}");
        assert!(msg.contains("tesseract exited"), "got: {msg}");
    }

    #[test]
    fn extract_error_is_transparent() {
        let e: ExtractError = ExtractionError::NotAPdf {
            magic: b"GIF8".to_vec(),
        }
        .into();
        assert!(e.to_string().contains("not a valid PDF"));
        assert!(matches!(e, ExtractError::Extraction(_)));
    }

    #[test]
    fn fault_classification() {
        let v = ServiceError::from(ValidationError::EmptyQuestion);
        assert_eq!(v.fault(), Fault::Client);

        let i = ServiceError::from(InferenceError::Timeout { secs: 30 });
        assert_eq!(i.fault(), Fault::Server);
        assert!(i.to_string().contains("30s"));
    }

    #[test]
    fn error_body_serialises() {
        let body = ServiceError::from(ValidationError::EmptyContext).body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["kind"], "validation");
        assert_eq!(json["fault"], "client");
        assert_eq!(json["message"], "empty context");
    }

    #[test]
    fn http_status_display() {
        let e = InferenceError::HttpStatus {
            status: 503,
            body: "model loading".into(),
        };
        assert!(e.to_string().contains("503"));
        assert!(e.to_string().contains("model loading"));
    }
}
