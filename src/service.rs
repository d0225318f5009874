//! Request service: validate a (context, question) pair and answer it.
//!
//! The service is transport-agnostic. A web handler, a queue consumer or the
//! CLI builds a [`QaRequest`], calls [`QaService::handle`] and maps the
//! outcome: a [`QaResponse`] on success, or [`ServiceError::fault`] /
//! [`ServiceError::body`] on failure.
//!
//! [`DocumentQa`] is the document-level flow on top: extract once, bound
//! the text once, then ask any number of questions against it.

use crate::config::PipelineConfig;
use crate::context::{self, BoundedContext};
use crate::document::{Document, ExtractedText};
use crate::error::{DocQaError, ExtractError, ServiceError, ValidationError};
use crate::extract::TextExtractor;
use crate::inference::{AnswerEngine, QaAnswer};
use crate::pipeline::input;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub use crate::inference::QaResponse;

/// One question about one context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaRequest {
    pub context: String,
    pub question: String,
}

impl QaRequest {
    pub fn new(context: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            question: question.into(),
        }
    }

    /// Context is checked before question.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.context.trim().is_empty() {
            return Err(ValidationError::EmptyContext);
        }
        if self.question.trim().is_empty() {
            return Err(ValidationError::EmptyQuestion);
        }
        Ok(())
    }
}

/// Stateless request handler around a shared [`AnswerEngine`].
#[derive(Debug, Clone)]
pub struct QaService {
    engine: Arc<AnswerEngine>,
}

impl QaService {
    pub fn new(engine: Arc<AnswerEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &AnswerEngine {
        &self.engine
    }

    /// Validate and answer one request.
    pub async fn handle(&self, request: &QaRequest) -> Result<QaAnswer, ServiceError> {
        info!(
            "QA request: {} context chars, question {:?}",
            request.context.chars().count(),
            request.question
        );
        request.validate()?;

        let answer = self
            .engine
            .answer(&request.context, &request.question)
            .await?;
        info!(
            "QA answer via {}: found={}",
            self.engine.model_name(),
            answer.is_found()
        );
        Ok(answer)
    }
}

/// A document whose text has been extracted and bounded.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub extracted: ExtractedText,
    pub context: BoundedContext,
}

/// Extract-once, ask-many flow over one configuration.
#[derive(Debug, Clone)]
pub struct DocumentQa {
    extractor: TextExtractor,
    service: QaService,
    max_context_length: usize,
    download_timeout_secs: u64,
    password: Option<String>,
}

impl DocumentQa {
    pub fn new(extractor: TextExtractor, engine: Arc<AnswerEngine>, max_context_length: usize) -> Self {
        Self {
            extractor,
            service: QaService::new(engine),
            max_context_length,
            download_timeout_secs: 120,
            password: None,
        }
    }

    /// Build the extractor and the answer engine. Engine construction
    /// failures are fatal here, before any document is touched.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, DocQaError> {
        let extractor = TextExtractor::from_config(config)?;
        let engine = Arc::new(AnswerEngine::from_config(config)?);
        let mut qa = Self::new(extractor, engine, config.max_context_length);
        qa.download_timeout_secs = config.download_timeout_secs;
        qa.password = config.password.clone();
        Ok(qa)
    }

    pub fn service(&self) -> &QaService {
        &self.service
    }

    /// Extract and bound an in-memory document.
    pub async fn prepare(&self, mut document: Document) -> Result<PreparedDocument, DocQaError> {
        if document.password().is_none() {
            if let Some(ref pwd) = self.password {
                document = document.with_password(pwd.clone());
            }
        }
        let extracted = self.extractor.extract(document).await?;
        let context = BoundedContext::from_extracted(&extracted, self.max_context_length)?;
        if context.truncated {
            info!(
                "Context truncated to {} of {} chars",
                self.max_context_length, extracted.stats.total_chars
            );
        }
        Ok(PreparedDocument { extracted, context })
    }

    /// Read a local file or download a URL, then [`Self::prepare`] it.
    pub async fn prepare_input(&self, input_str: &str) -> Result<PreparedDocument, DocQaError> {
        let document = input::resolve_input(input_str, self.download_timeout_secs)
            .await
            .map_err(ExtractError::from)?;
        self.prepare(document).await
    }

    /// Answer one question against an already prepared document.
    pub async fn ask(
        &self,
        document: &PreparedDocument,
        question: &str,
    ) -> Result<QaAnswer, ServiceError> {
        let request = QaRequest::new(document.context.text.clone(), question);
        self.service.handle(&request).await
    }

    /// Answer against raw text, bounding it first.
    pub async fn ask_text(&self, text: &str, question: &str) -> Result<QaAnswer, ServiceError> {
        let context = context::prepare(text, self.max_context_length)?;
        self.service
            .handle(&QaRequest::new(context.text, question))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{LexicalModel, FALLBACK_ANSWER};

    fn service() -> QaService {
        QaService::new(Arc::new(AnswerEngine::new(Arc::new(LexicalModel::new()))))
    }

    #[tokio::test]
    async fn answers_from_context() {
        let answer = service()
            .handle(&QaRequest::new("The sky is blue.", "What color is the sky?"))
            .await
            .unwrap();
        assert_eq!(answer.text(), "blue");
    }

    #[tokio::test]
    async fn unanswerable_question_gets_fallback() {
        let answer = service()
            .handle(&QaRequest::new(
                "The sky is blue.",
                "What is the capital of France?",
            ))
            .await
            .unwrap();
        assert_eq!(answer, QaAnswer::NotFound);
        assert_eq!(answer.text(), FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn empty_context_rejected_first() {
        let err = service()
            .handle(&QaRequest::new("", "   "))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::EmptyContext)
        ));
    }

    #[tokio::test]
    async fn whitespace_question_rejected() {
        let err = service()
            .handle(&QaRequest::new("The sky is blue.", " \n\t"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::EmptyQuestion)
        ));
        assert_eq!(err.to_string(), "ValidationError: empty question");
    }

    #[test]
    fn request_deserialises_from_wire() {
        let req: QaRequest =
            serde_json::from_str(r#"{"context": "c", "question": "q"}"#).unwrap();
        assert_eq!(req, QaRequest::new("c", "q"));
    }
}
