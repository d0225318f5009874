//! Integration tests for the extraction → context → answer flow.
//!
//! The rasteriser, recogniser and (where needed) QA model are in-memory
//! fakes, so these run without pdfium, tesseract or network access.

use async_trait::async_trait;
use edgequake_docqa::pipeline::ocr::Recognizer;
use edgequake_docqa::pipeline::render::{PageImage, Rasterizer};
use edgequake_docqa::{
    AnswerEngine, ContextError, Document, DocumentQa, ExtractError, ExtractionError,
    ExtractionProgressCallback, Fault, InferenceError, QaAnswer, QaModel, QaRequest, QaService,
    RecognitionError, RecognitionStage, ServiceError, Span, TextExtractor, ValidationError,
    FALLBACK_ANSWER, TRUNCATION_MARKER,
};
use image::DynamicImage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Produces `n` tiny blank page images.
struct FakePages(usize);

impl Rasterizer for FakePages {
    fn rasterize(&self, _document: &Document) -> Result<Vec<PageImage>, ExtractionError> {
        Ok((0..self.0)
            .map(|i| PageImage::new(i, DynamicImage::new_luma8(8, 8)))
            .collect())
    }
}

/// Returns scripted text per page, after a per-page delay.
///
/// Earlier pages get longer delays so completion order is reversed.
struct ScriptedRecognizer {
    texts: HashMap<usize, &'static str>,
    fail_page: Option<usize>,
    calls: AtomicUsize,
}

impl ScriptedRecognizer {
    fn new(texts: &[&'static str]) -> Self {
        Self {
            texts: texts
                .iter()
                .enumerate()
                .map(|(i, t)| (i + 1, *t))
                .collect(),
            fail_page: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing_on(mut self, page: usize) -> Self {
        self.fail_page = Some(page);
        self
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn recognize(&self, page: &PageImage) -> Result<String, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let n = page.page_num();
        let delay = (self.texts.len() + 1 - n.min(self.texts.len())) as u64 * 15;
        tokio::time::sleep(Duration::from_millis(delay)).await;

        if self.fail_page == Some(n) {
            return Err(RecognitionError::new(
                n,
                RecognitionStage::Engine,
                "tesseract exited with status 1",
            ));
        }
        Ok(self.texts.get(&n).copied().unwrap_or_default().to_string())
    }
}

#[derive(Default)]
struct RecordingProgress {
    started: AtomicUsize,
    completed: AtomicUsize,
    text_lens: Mutex<Vec<usize>>,
    errors: Mutex<Vec<usize>>,
    finished: Mutex<Vec<(usize, usize)>>,
}

impl ExtractionProgressCallback for RecordingProgress {
    fn on_extraction_start(&self, total_pages: usize) {
        self.started.store(total_pages, Ordering::SeqCst);
    }

    fn on_page_complete(&self, _page_num: usize, _total_pages: usize, text_len: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.text_lens.lock().unwrap().push(text_len);
    }

    fn on_page_error(&self, page_num: usize, _total_pages: usize, _error: &str) {
        self.errors.lock().unwrap().push(page_num);
    }

    fn on_extraction_complete(&self, total_pages: usize, recognised: usize) {
        self.finished.lock().unwrap().push((total_pages, recognised));
    }
}

fn pdf() -> Document {
    Document::new(b"%PDF-1.4\n%fake\n".to_vec())
}

fn extractor(pages: usize, recognizer: ScriptedRecognizer) -> TextExtractor {
    TextExtractor::new(Arc::new(FakePages(pages)), Arc::new(recognizer)).with_concurrency(4)
}

fn lexical_engine() -> Arc<AnswerEngine> {
    Arc::new(AnswerEngine::new(Arc::new(edgequake_docqa::inference::LexicalModel::new())))
}

// ── Extraction ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn page_order_survives_out_of_order_completion() {
    let recognizer = ScriptedRecognizer::new(&["first page", "second page", "third page"]);
    let out = extractor(3, recognizer).extract(pdf()).await.unwrap();

    assert_eq!(out.text, "first page\nsecond page\nthird page\n");
    let nums: Vec<usize> = out.pages.iter().map(|p| p.page_num).collect();
    assert_eq!(nums, vec![1, 2, 3]);
}

#[tokio::test]
async fn one_segment_per_page_including_blank_pages() {
    let recognizer = ScriptedRecognizer::new(&["alpha", "", "  \n ", "delta"]);
    let out = extractor(4, recognizer).extract(pdf()).await.unwrap();

    let segments: Vec<&str> = out.segments().collect();
    assert_eq!(segments, vec!["alpha", "", "", "delta"]);
    assert_eq!(out.stats.total_pages, 4);
    assert_eq!(out.stats.empty_pages, 2);
    assert_eq!(out.stats.recognizer, "scripted");
}

#[tokio::test]
async fn layout_whitespace_is_collapsed_per_page() {
    let recognizer = ScriptedRecognizer::new(&["Invoice\n  No.\t42\r\n", "infor-\nmation"]);
    let out = extractor(2, recognizer).extract(pdf()).await.unwrap();
    assert_eq!(out.text, "Invoice No. 42\ninformation\n");
}

#[tokio::test]
async fn failing_page_aborts_with_its_page_number() {
    let progress = Arc::new(RecordingProgress::default());
    let recognizer = ScriptedRecognizer::new(&["one", "two", "three"]).failing_on(1);
    let result = extractor(3, recognizer)
        .with_progress(progress.clone())
        .extract(pdf())
        .await;

    match result {
        Err(ExtractError::Recognition(e)) => {
            assert_eq!(e.page, 1);
            assert_eq!(e.stage, RecognitionStage::Engine);
        }
        other => panic!("expected RecognitionError, got {other:?}"),
    }
    assert_eq!(progress.started.load(Ordering::SeqCst), 3);
    assert_eq!(*progress.errors.lock().unwrap(), vec![1]);

    let finished = progress.finished.lock().unwrap().clone();
    assert_eq!(finished.len(), 1, "completion fires once: {finished:?}");
    let (total, recognised) = finished[0];
    assert_eq!(total, 3);
    assert!(recognised < 3);
    assert_eq!(recognised, progress.completed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn non_pdf_fails_before_recognition() {
    let recognizer = Arc::new(ScriptedRecognizer::new(&["never"]));
    let extractor = TextExtractor::new(Arc::new(FakePages(1)), recognizer.clone());

    let err = extractor
        .extract(Document::new(b"PK\x03\x04zip".to_vec()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExtractError::Extraction(ExtractionError::NotAPdf { .. })
    ));
    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn progress_reports_every_page() {
    let progress = Arc::new(RecordingProgress::default());
    let recognizer = ScriptedRecognizer::new(&["a", "b", "c", "d", "e"]);
    extractor(5, recognizer)
        .with_progress(progress.clone())
        .extract(pdf())
        .await
        .unwrap();
    assert_eq!(progress.started.load(Ordering::SeqCst), 5);
    assert_eq!(progress.completed.load(Ordering::SeqCst), 5);
    assert_eq!(*progress.finished.lock().unwrap(), vec![(5, 5)]);
}

#[tokio::test]
async fn page_length_is_reported_in_characters() {
    let progress = Arc::new(RecordingProgress::default());
    extractor(1, ScriptedRecognizer::new(&["héé"]))
        .with_progress(progress.clone())
        .extract(pdf())
        .await
        .unwrap();
    assert_eq!(*progress.text_lens.lock().unwrap(), vec![3]);
}

// ── Document QA flow ─────────────────────────────────────────────────────────

#[tokio::test]
async fn extract_once_ask_many() {
    let recognizer = ScriptedRecognizer::new(&[
        "ACME Corp invoice. Invoice number INV-0042.",
        "The total amount is 1,250 EUR. Payment is due in March.",
    ]);
    let qa = DocumentQa::new(extractor(2, recognizer), lexical_engine(), 4000);
    let doc = qa.prepare(pdf()).await.unwrap();
    assert!(!doc.context.truncated);

    let total = qa.ask(&doc, "What is the total amount?").await.unwrap();
    assert_eq!(total.text(), "1,250 EUR");

    let due = qa.ask(&doc, "When is payment due?").await.unwrap();
    assert_eq!(due.text(), "March");

    let missing = qa.ask(&doc, "Who signed the contract?").await.unwrap();
    assert_eq!(missing, QaAnswer::NotFound);
    assert_eq!(missing.text(), FALLBACK_ANSWER);
}

#[tokio::test]
async fn long_documents_are_truncated_before_answering() {
    let recognizer = ScriptedRecognizer::new(&[
        "The early part mentions the colour red.",
        "Much later the secret password is swordfish.",
    ]);
    let qa = DocumentQa::new(extractor(2, recognizer), lexical_engine(), 40);
    let doc = qa.prepare(pdf()).await.unwrap();

    assert!(doc.context.truncated);
    assert!(doc.context.text.ends_with(TRUNCATION_MARKER));
    assert_eq!(doc.context.body().chars().count(), 40);

    let answer = qa.ask(&doc, "What is the secret password?").await.unwrap();
    assert_eq!(answer, QaAnswer::NotFound);
}

#[tokio::test]
async fn blank_document_question_is_a_validation_error() {
    let recognizer = ScriptedRecognizer::new(&["", ""]);
    let qa = DocumentQa::new(extractor(2, recognizer), lexical_engine(), 4000);
    let doc = qa.prepare(pdf()).await.unwrap();

    let err = qa.ask(&doc, "Anything?").await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::EmptyContext)
    ));
}

#[tokio::test]
async fn zero_context_limit_is_reported_not_hidden() {
    let qa = DocumentQa::new(extractor(1, ScriptedRecognizer::new(&[])), lexical_engine(), 0);

    let err = qa
        .ask_text("The sky is blue.", "What color is the sky?")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Context(ContextError::InvalidMaxLength)
    ));
    assert_eq!(err.fault(), Fault::Server);
}

// ── Service ──────────────────────────────────────────────────────────────────

/// Always proposes text that is not in any context.
struct Hallucinating;

#[async_trait]
impl QaModel for Hallucinating {
    fn name(&self) -> &str {
        "hallucinating"
    }

    async fn predict(&self, _: &str, _: &str) -> Result<Option<Span>, InferenceError> {
        Ok(Some(Span::new("Paris", Some(0.99))))
    }
}

struct Unreachable;

#[async_trait]
impl QaModel for Unreachable {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn predict(&self, _: &str, _: &str) -> Result<Option<Span>, InferenceError> {
        Err(InferenceError::ModelUnavailable {
            model: "qa".into(),
            detail: "connection refused".into(),
        })
    }
}

#[tokio::test]
async fn hallucinated_span_is_not_returned() {
    let service = QaService::new(Arc::new(AnswerEngine::new(Arc::new(Hallucinating))));
    let answer = service
        .handle(&QaRequest::new("The sky is blue.", "What is the capital of France?"))
        .await
        .unwrap();
    assert_eq!(answer.text(), FALLBACK_ANSWER);
}

#[tokio::test]
async fn inference_failure_is_a_server_fault() {
    let service = QaService::new(Arc::new(AnswerEngine::new(Arc::new(Unreachable))));
    let err = service
        .handle(&QaRequest::new("The sky is blue.", "What color is the sky?"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Inference(_)));
    assert_eq!(err.fault(), edgequake_docqa::Fault::Server);
    assert_eq!(err.body().kind, "inference");
}

#[tokio::test]
async fn shared_engine_serves_concurrent_requests() {
    let service = QaService::new(lexical_engine());
    let mut handles = Vec::new();
    for i in 0..16 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let (ctx, q, want) = if i % 2 == 0 {
                ("The sky is blue.", "What color is the sky?", "blue")
            } else {
                ("The grass is green.", "What color is the grass?", "green")
            };
            let answer = service.handle(&QaRequest::new(ctx, q)).await.unwrap();
            assert_eq!(answer.text(), want);
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
}
