//! Pipeline stages for document text extraction.
//!
//! Each submodule implements exactly one transformation step, so each can
//! be tested alone and swapped (e.g. Tesseract for a vision model) without
//! touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ ocr | vision ──▶ postprocess
//! (bytes)   (pdfium)   (PNG)      (per page)      (cleanup)
//! ```
//!
//! 1. [`input`] : read a local file or download a URL into a `Document`
//! 2. [`render`]: rasterise every page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`encode`]: PNG-encode a page for the recogniser
//! 4. [`ocr`] / [`vision`]: recognise one page; [`llm`] holds the retry
//!    loop shared with the LLM answer model
//! 5. [`postprocess`]: deterministic cleanup down to one line per page

pub mod encode;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod postprocess;
pub mod render;
pub mod vision;
