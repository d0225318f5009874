//! # edgequake-docqa
//!
//! Ask natural-language questions about scanned PDF documents.
//!
//! ## Why this crate?
//!
//! Scanned PDFs carry no text layer, so `pdftotext`-style tools return
//! nothing. This crate rasterises every page, reads it with OCR (Tesseract,
//! or a vision LLM when Tesseract struggles) and answers questions with an
//! **extractive** engine: every answer is a verbatim span of the document,
//! or the fixed fallback sentence when no span answers the question.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    read a local file or download from URL
//!  ├─ 2. Render   rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. OCR      concurrent per-page recognition (tesseract | vision LLM)
//!  ├─ 4. Clean    one whitespace-normalised line per page
//!  ├─ 5. Context  bound the text to the engine's input limit
//!  └─ 6. Answer   span selection (lexical | remote server | LLM),
//!                 verified against the context
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docqa::{DocumentQa, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let qa = DocumentQa::from_config(&config)?;
//!
//!     let doc = qa.prepare_input("invoice.pdf").await?;
//!     for question in ["What is the invoice number?", "Who is the supplier?"] {
//!         let answer = qa.ask(&doc, question).await?;
//!         println!("{question} → {}", answer.text());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docqa` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-docqa = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime requirements
//!
//! * A pdfium shared library: system-wide, next to the executable, or named
//!   by `PDFIUM_LIB_PATH`.
//! * The `tesseract` executable with the configured language data, unless
//!   the vision recogniser is selected.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod extract;
pub mod inference;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod service;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{EngineKind, PipelineConfig, PipelineConfigBuilder, RecognizerKind};
pub use context::{prepare, BoundedContext, TRUNCATION_MARKER};
pub use document::{Document, ExtractedText, ExtractionStats, PageText};
pub use error::{
    ContextError, DocQaError, ExtractError, ExtractionError, Fault, InferenceError,
    RecognitionError, RecognitionStage, ServiceError, ValidationError,
};
pub use extract::{extract_bytes, extract_file, extract_sync, TextExtractor};
pub use inference::{AnswerEngine, QaAnswer, QaModel, QaResponse, Span, FALLBACK_ANSWER};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use service::{DocumentQa, PreparedDocument, QaRequest, QaService};
