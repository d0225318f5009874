//! LLM-backed answer model.
//!
//! The model is asked to copy a span verbatim or reply [`NO_ANSWER_TOKEN`].
//! Whatever it replies is still only a candidate: the engine discards it
//! unless it occurs in the context.

use super::{QaModel, Span};
use crate::config::PipelineConfig;
use crate::error::{DocQaError, InferenceError};
use crate::pipeline::llm::{build_options, chat_with_retry, RetryPolicy};
use crate::prompts::{extractive_qa_message, EXTRACTIVE_QA_PROMPT, NO_ANSWER_TOKEN};
use crate::provider::resolve_provider;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;

/// Answers are short spans; a small completion budget is plenty.
const ANSWER_MAX_TOKENS: usize = 256;

pub struct LlmModel {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    policy: RetryPolicy,
}

impl LlmModel {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            options: build_options(config, ANSWER_MAX_TOKENS),
            policy: RetryPolicy::from_config(config),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, DocQaError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }
}

/// Strip the decoration models like to add around a copied span.
fn normalise_reply(reply: &str) -> Option<&str> {
    let mut s = reply.trim();
    if let Some(rest) = s.strip_prefix("Answer:") {
        s = rest.trim();
    }
    let s = s.trim_matches(|c: char| c == '"' || c == '`' || c == '\'').trim();
    if s.is_empty() || s.eq_ignore_ascii_case(NO_ANSWER_TOKEN) {
        None
    } else {
        Some(s)
    }
}

#[async_trait]
impl QaModel for LlmModel {
    fn name(&self) -> &str {
        "llm"
    }

    async fn predict(
        &self,
        context: &str,
        question: &str,
    ) -> Result<Option<Span>, InferenceError> {
        let messages = vec![
            ChatMessage::system(EXTRACTIVE_QA_PROMPT),
            ChatMessage::user(extractive_qa_message(context, question)),
        ];
        let reply = chat_with_retry(&self.provider, messages, &self.options, self.policy, "answer")
            .await
            .map_err(|detail| InferenceError::ProviderFailed {
                retries: self.policy.max_retries,
                detail,
            })?;

        Ok(normalise_reply(&reply).map(|s| Span::new(s, None)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_answer_token_is_none() {
        assert_eq!(normalise_reply("NO_ANSWER"), None);
        assert_eq!(normalise_reply("  no_answer \n"), None);
        assert_eq!(normalise_reply(""), None);
    }

    #[test]
    fn decoration_is_stripped() {
        assert_eq!(normalise_reply("Answer: \"blue\""), Some("blue"));
        assert_eq!(normalise_reply("`42 km`\n"), Some("42 km"));
        assert_eq!(normalise_reply("Paris"), Some("Paris"));
    }
}
