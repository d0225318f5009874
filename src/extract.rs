//! Text extraction: document bytes in, page-ordered text out.
//!
//! ## Failure policy
//!
//! Extraction is all-or-nothing. The first page that fails recognition
//! aborts the whole call; in-flight recognitions of other pages are dropped
//! and no partial text is returned. A blank page is not a failure: it
//! contributes an empty segment.

use crate::config::{PipelineConfig, RecognizerKind};
use crate::document::{Document, ExtractedText, ExtractionStats, PageText};
use crate::error::{DocQaError, ExtractError, ExtractionError};
use crate::pipeline::ocr::{Recognizer, TesseractRecognizer};
use crate::pipeline::render::{render_pages, PageImage, PdfiumRasterizer, Rasterizer};
use crate::pipeline::vision::VisionRecognizer;
use crate::pipeline::{input, postprocess};
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Rasterises a document and recognises every page concurrently.
///
/// Cheap to clone; the rasteriser and recogniser are shared.
#[derive(Clone)]
pub struct TextExtractor {
    rasterizer: Arc<dyn Rasterizer>,
    recognizer: Arc<dyn Recognizer>,
    concurrency: usize,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for TextExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextExtractor")
            .field("recognizer", &self.recognizer.name())
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl TextExtractor {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, recognizer: Arc<dyn Recognizer>) -> Self {
        Self {
            rasterizer,
            recognizer,
            concurrency: 4,
            progress: None,
        }
    }

    /// Build the pdfium rasteriser and the configured recogniser.
    ///
    /// Fails only when the vision recogniser is selected and no LLM provider
    /// can be resolved. A missing pdfium library or tesseract executable is
    /// reported per extraction, not here.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, DocQaError> {
        let recognizer: Arc<dyn Recognizer> = match config.recognizer {
            RecognizerKind::Tesseract => Arc::new(TesseractRecognizer::from_config(config)),
            RecognizerKind::Vision => Arc::new(VisionRecognizer::from_config(config)?),
        };
        let mut extractor = Self::new(Arc::new(PdfiumRasterizer::from_config(config)), recognizer)
            .with_concurrency(config.concurrency);
        if let Some(ref cb) = config.progress_callback {
            extractor = extractor.with_progress(Arc::clone(cb));
        }
        Ok(extractor)
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_progress(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }

    pub fn recognizer_name(&self) -> &str {
        self.recognizer.name()
    }

    /// Extract the text of every page, in page order.
    pub async fn extract(&self, document: Document) -> Result<ExtractedText, ExtractError> {
        let total_start = Instant::now();
        document.validate()?;
        info!(
            "Starting extraction: {} bytes, recogniser '{}'",
            document.len(),
            self.recognizer.name()
        );

        // ── Rasterise ────────────────────────────────────────────────────
        let render_start = Instant::now();
        let images = render_pages(Arc::clone(&self.rasterizer), document).await?;
        let render_duration_ms = render_start.elapsed().as_millis() as u64;
        if images.is_empty() {
            return Err(ExtractionError::NoPages.into());
        }
        let total_pages = images.len();
        info!("Rendered {} pages in {}ms", total_pages, render_duration_ms);

        if let Some(ref cb) = self.progress {
            cb.on_extraction_start(total_pages);
        }

        // ── Recognise ────────────────────────────────────────────────────
        let recognition_start = Instant::now();
        let recognised = Arc::new(AtomicUsize::new(0));
        let collected: Result<Vec<PageText>, ExtractError> =
            stream::iter(images.into_iter().map(|page| {
                let recognizer = Arc::clone(&self.recognizer);
                let progress = self.progress.clone();
                let recognised = Arc::clone(&recognised);
                async move {
                    let page = recognise_page(recognizer, page, total_pages, progress).await?;
                    recognised.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ExtractError>(page)
                }
            }))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await;
        if let Some(ref cb) = self.progress {
            cb.on_extraction_complete(total_pages, recognised.load(Ordering::SeqCst));
        }
        let mut pages = collected?;
        let recognition_duration_ms = recognition_start.elapsed().as_millis() as u64;

        // Completion order is arbitrary
        pages.sort_by_key(|p| p.page_num);

        let stats = ExtractionStats {
            render_duration_ms,
            recognition_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
            recognizer: self.recognizer.name().to_string(),
            ..Default::default()
        };
        let extracted = ExtractedText::from_pages(pages, stats);

        info!(
            "Extraction complete: {} pages ({} blank), {} chars, {}ms",
            extracted.stats.total_pages,
            extracted.stats.empty_pages,
            extracted.stats.total_chars,
            extracted.stats.total_duration_ms
        );

        Ok(extracted)
    }
}

async fn recognise_page(
    recognizer: Arc<dyn Recognizer>,
    page: PageImage,
    total_pages: usize,
    progress: Option<ProgressCallback>,
) -> Result<PageText, ExtractError> {
    let page_num = page.page_num();
    if let Some(ref cb) = progress {
        cb.on_page_start(page_num, total_pages);
    }

    let start = Instant::now();
    match recognizer.recognize(&page).await {
        Ok(raw) => {
            let text = postprocess::clean_page_text(&raw);
            let chars = text.chars().count();
            debug!("Page {}: {} chars in {:?}", page_num, chars, start.elapsed());
            if let Some(ref cb) = progress {
                cb.on_page_complete(page_num, total_pages, chars);
            }
            Ok(PageText {
                page_num,
                text,
                duration_ms: start.elapsed().as_millis() as u64,
            })
        }
        Err(e) => {
            warn!("Page {} failed: {}", page_num, e);
            if let Some(ref cb) = progress {
                cb.on_page_error(page_num, total_pages, &e.to_string());
            }
            Err(e.into())
        }
    }
}

/// Extract text from a local PDF file or an HTTP/HTTPS URL.
///
/// # Example
/// ```rust,no_run
/// use edgequake_docqa::{extract_file, PipelineConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PipelineConfig::default();
/// let extracted = extract_file("scan.pdf", &config).await?;
/// for (i, segment) in extracted.segments().enumerate() {
///     println!("page {}: {}", i + 1, segment);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn extract_file(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<ExtractedText, DocQaError> {
    let document = input::resolve_input(input_str.as_ref(), config.download_timeout_secs)
        .await
        .map_err(ExtractError::from)?;
    extract_document(document, config).await
}

/// Extract text from PDF bytes already in memory.
pub async fn extract_bytes(
    bytes: impl Into<Vec<u8>>,
    config: &PipelineConfig,
) -> Result<ExtractedText, DocQaError> {
    extract_document(Document::new(bytes), config).await
}

/// Synchronous wrapper around [`extract_file`].
///
/// Creates a temporary tokio runtime internally; do not call from inside one.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &PipelineConfig,
) -> Result<ExtractedText, DocQaError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| {
            DocQaError::from(ExtractError::from(ExtractionError::Internal(format!(
                "Failed to create tokio runtime: {}",
                e
            ))))
        })?
        .block_on(extract_file(input_str, config))
}

async fn extract_document(
    mut document: Document,
    config: &PipelineConfig,
) -> Result<ExtractedText, DocQaError> {
    if let Some(ref pwd) = config.password {
        document = document.with_password(pwd.clone());
    }
    let extractor = TextExtractor::from_config(config)?;
    Ok(extractor.extract(document).await?)
}
