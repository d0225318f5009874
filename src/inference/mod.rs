//! Answer inference: pick the span of a context that answers a question.
//!
//! A [`QaModel`] proposes a candidate span; the [`AnswerEngine`] accepts it
//! only if it can be located in the context, and then returns the context's
//! own slice. A model that paraphrases or invents text therefore yields
//! [`QaAnswer::NotFound`], never a non-extractive answer.
//!
//! ```text
//! (context, question) ──▶ QaModel::predict ──▶ Option<Span>
//!                                                  │
//!                               locate_span ◀──────┘
//!                                    │
//!                         Found { text ⊆ context } | NotFound
//! ```

pub mod lexical;
pub mod llm;
pub mod remote;

pub use lexical::LexicalModel;
pub use llm::LlmModel;
pub use remote::RemoteModel;

use crate::config::{EngineKind, PipelineConfig};
use crate::error::{DocQaError, InferenceError};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Returned to the user whenever no answer span is found.
pub const FALLBACK_ANSWER: &str = "Sorry, I couldn't find an answer.";

/// A candidate answer proposed by a model.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    /// Model confidence in `[0, 1]`, when the model reports one.
    pub score: Option<f32>,
}

impl Span {
    pub fn new(text: impl Into<String>, score: Option<f32>) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}

/// An extractive question-answering model.
///
/// Implementations hold no per-request state and may be called concurrently.
#[async_trait]
pub trait QaModel: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Propose the span of `context` that answers `question`, or `None`.
    async fn predict(&self, context: &str, question: &str)
        -> Result<Option<Span>, InferenceError>;
}

/// Outcome of one question.
#[derive(Debug, Clone, PartialEq)]
pub enum QaAnswer {
    /// `text` is a contiguous substring of the context.
    Found { text: String, score: Option<f32> },
    NotFound,
}

impl QaAnswer {
    /// The user-facing answer; [`FALLBACK_ANSWER`] when nothing was found.
    pub fn text(&self) -> &str {
        match self {
            QaAnswer::Found { text, .. } => text,
            QaAnswer::NotFound => FALLBACK_ANSWER,
        }
    }

    pub fn score(&self) -> Option<f32> {
        match self {
            QaAnswer::Found { score, .. } => *score,
            QaAnswer::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, QaAnswer::Found { .. })
    }
}

/// Wire form of a [`QaAnswer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaResponse {
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub score: Option<f32>,
    pub found: bool,
}

impl From<&QaAnswer> for QaResponse {
    fn from(answer: &QaAnswer) -> Self {
        Self {
            answer: answer.text().to_string(),
            score: answer.score(),
            found: answer.is_found(),
        }
    }
}

/// Shared, stateless answer engine.
///
/// Built once at startup and cloned freely; clones share the model.
#[derive(Clone)]
pub struct AnswerEngine {
    model: Arc<dyn QaModel>,
}

impl std::fmt::Debug for AnswerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerEngine")
            .field("model", &self.model.name())
            .finish()
    }
}

impl AnswerEngine {
    pub fn new(model: Arc<dyn QaModel>) -> Self {
        Self { model }
    }

    /// Build the model selected by `config.engine`.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, DocQaError> {
        let model: Arc<dyn QaModel> = match config.engine {
            EngineKind::Lexical => Arc::new(LexicalModel::new()),
            EngineKind::Remote => Arc::new(RemoteModel::from_config(config)?),
            EngineKind::Llm => Arc::new(LlmModel::from_config(config)?),
        };
        Ok(Self::new(model))
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Answer `question` from `context`.
    ///
    /// Empty inputs are the service's concern; here they simply find nothing.
    pub async fn answer(&self, context: &str, question: &str) -> Result<QaAnswer, InferenceError> {
        if context.trim().is_empty() || question.trim().is_empty() {
            return Ok(QaAnswer::NotFound);
        }

        let Some(span) = self.model.predict(context, question).await? else {
            debug!("{}: no span", self.model.name());
            return Ok(QaAnswer::NotFound);
        };

        match locate_span(context, &span.text) {
            Some(text) => {
                debug!("{}: answer '{}' (score {:?})", self.model.name(), text, span.score);
                Ok(QaAnswer::Found {
                    text: text.to_string(),
                    score: span.score,
                })
            }
            None => {
                if !span.text.trim().is_empty() {
                    warn!(
                        "{}: candidate '{}' is not in the context, discarding",
                        self.model.name(),
                        span.text
                    );
                }
                Ok(QaAnswer::NotFound)
            }
        }
    }
}

/// Find `candidate` in `context` and return the context's own slice.
///
/// Exact match first, then case-insensitive with any whitespace run
/// matching any other.
pub fn locate_span<'a>(context: &'a str, candidate: &str) -> Option<&'a str> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }
    if let Some(start) = context.find(candidate) {
        return Some(&context[start..start + candidate.len()]);
    }

    let pattern = candidate
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    let re = Regex::new(&format!("(?i){pattern}")).ok()?;
    re.find(context).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<&'static str>);

    #[async_trait]
    impl QaModel for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn predict(&self, _: &str, _: &str) -> Result<Option<Span>, InferenceError> {
            Ok(self.0.map(|t| Span::new(t, Some(0.5))))
        }
    }

    struct Broken;

    #[async_trait]
    impl QaModel for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn predict(&self, _: &str, _: &str) -> Result<Option<Span>, InferenceError> {
            Err(InferenceError::Timeout { secs: 1 })
        }
    }

    fn engine(model: impl QaModel + 'static) -> AnswerEngine {
        AnswerEngine::new(Arc::new(model))
    }

    #[test]
    fn locate_exact_and_relaxed() {
        let ctx = "The Eiffel  Tower is in\nParis.";
        assert_eq!(locate_span(ctx, "Paris"), Some("Paris"));
        assert_eq!(locate_span(ctx, "eiffel tower"), Some("Eiffel  Tower"));
        assert_eq!(locate_span(ctx, "is in paris"), Some("is in\nParis"));
        assert_eq!(locate_span(ctx, "London"), None);
        assert_eq!(locate_span(ctx, "   "), None);
    }

    #[test]
    fn locate_escapes_regex_metacharacters() {
        let ctx = "Total cost (USD): $4.50 per unit.";
        assert_eq!(locate_span(ctx, "(usd): $4.50"), Some("(USD): $4.50"));
        assert_eq!(locate_span(ctx, "$4x50"), None);
    }

    #[tokio::test]
    async fn engine_returns_context_slice() {
        let answer = engine(Fixed(Some("BLUE")))
            .answer("The sky is blue.", "What color is the sky?")
            .await
            .unwrap();
        assert_eq!(
            answer,
            QaAnswer::Found {
                text: "blue".into(),
                score: Some(0.5)
            }
        );
    }

    #[tokio::test]
    async fn non_context_candidate_is_not_found() {
        let answer = engine(Fixed(Some("Paris")))
            .answer("The sky is blue.", "What is the capital of France?")
            .await
            .unwrap();
        assert_eq!(answer, QaAnswer::NotFound);
        assert_eq!(answer.text(), FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn no_span_is_not_found() {
        let answer = engine(Fixed(None)).answer("ctx", "q").await.unwrap();
        assert!(!answer.is_found());
    }

    #[tokio::test]
    async fn model_errors_propagate() {
        let err = engine(Broken).answer("ctx", "q").await.unwrap_err();
        assert!(matches!(err, InferenceError::Timeout { .. }));
    }

    #[test]
    fn response_wire_form() {
        let found = QaResponse::from(&QaAnswer::Found {
            text: "blue".into(),
            score: None,
        });
        let json = serde_json::to_value(&found).unwrap();
        assert_eq!(json, serde_json::json!({"answer": "blue", "found": true}));

        let missing = QaResponse::from(&QaAnswer::NotFound);
        assert_eq!(missing.answer, FALLBACK_ANSWER);
        assert!(!missing.found);
    }
}
