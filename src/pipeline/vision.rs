//! Vision-LLM recogniser: transcribe a page image with a multimodal model.
//!
//! Useful where Tesseract struggles (handwriting, low-contrast scans,
//! mixed scripts). The request carries the transcription prompt as a system
//! message and the page PNG as the only user content.

use crate::config::PipelineConfig;
use crate::error::{DocQaError, RecognitionError, RecognitionStage};
use crate::pipeline::encode::encode_image_data;
use crate::pipeline::llm::{build_options, chat_with_retry, RetryPolicy};
use crate::pipeline::ocr::Recognizer;
use crate::pipeline::render::PageImage;
use crate::prompts::TRANSCRIPTION_PROMPT;
use crate::provider::resolve_provider;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;

/// Recogniser backed by a vision-capable LLM provider.
pub struct VisionRecognizer {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    policy: RetryPolicy,
}

impl VisionRecognizer {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            options: build_options(config, config.max_tokens),
            policy: RetryPolicy::from_config(config),
        }
    }

    /// Resolve the provider from the config or environment.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, DocQaError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }
}

#[async_trait]
impl Recognizer for VisionRecognizer {
    fn name(&self) -> &str {
        "vision"
    }

    async fn recognize(&self, page: &PageImage) -> Result<String, RecognitionError> {
        let page_num = page.page_num();
        let image = encode_image_data(&page.image).map_err(|e| {
            RecognitionError::new(
                page_num,
                RecognitionStage::Encode,
                format!("Image encoding failed: {e}"),
            )
        })?;

        let messages = vec![
            ChatMessage::system(TRANSCRIPTION_PROMPT),
            ChatMessage::user_with_images("", vec![image]),
        ];

        let label = format!("Page {page_num}");
        chat_with_retry(&self.provider, messages, &self.options, self.policy, &label)
            .await
            .map_err(|detail| {
                RecognitionError::new(
                    page_num,
                    RecognitionStage::Engine,
                    format!("failed after {} retries: {detail}", self.policy.max_retries),
                )
            })
    }
}
