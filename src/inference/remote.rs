//! Out-of-process extractive QA server reached over HTTP.
//!
//! Wire format, one request per question:
//!
//! ```text
//! POST {endpoint}
//! {"context": "...", "question": "..."}
//!
//! 200 OK
//! {"answer": "...", "score": 0.93}
//! ```
//!
//! `score` is optional. A server that answers with the fallback sentence, or
//! with an empty answer, is read as "no span".

use super::{QaModel, Span, FALLBACK_ANSWER};
use crate::config::PipelineConfig;
use crate::error::{DocQaError, InferenceError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct RemoteRequest<'a> {
    context: &'a str,
    question: &'a str,
}

#[derive(Debug, Deserialize)]
struct RemoteAnswer {
    answer: String,
    #[serde(default)]
    score: Option<f32>,
}

/// HTTP client for a QA inference server.
#[derive(Debug, Clone)]
pub struct RemoteModel {
    client: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
}

impl RemoteModel {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self, DocQaError> {
        let endpoint = endpoint.into();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DocQaError::ModelInit {
                model: endpoint.clone(),
                detail: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint,
            timeout_secs,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, DocQaError> {
        let endpoint = config
            .inference_url
            .as_deref()
            .ok_or_else(|| DocQaError::ModelInit {
                model: "remote".into(),
                detail: "no inference URL configured".into(),
            })?;
        Self::new(endpoint, config.api_timeout_secs)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_send_error(&self, e: reqwest::Error) -> InferenceError {
        if e.is_timeout() {
            InferenceError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            InferenceError::ModelUnavailable {
                model: self.endpoint.clone(),
                detail: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl QaModel for RemoteModel {
    fn name(&self) -> &str {
        "remote"
    }

    async fn predict(
        &self,
        context: &str,
        question: &str,
    ) -> Result<Option<Span>, InferenceError> {
        debug!("POST {} ({} context chars)", self.endpoint, context.chars().count());

        let response = self
            .client
            .post(&self.endpoint)
            .json(&RemoteRequest { context, question })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(|e| self.map_send_error(e))?;
        let parsed: RemoteAnswer = serde_json::from_str(&body)
            .map_err(|e| InferenceError::MalformedResponse(format!("{e}: {body}")))?;

        let answer = parsed.answer.trim();
        if answer.is_empty() || answer == FALLBACK_ANSWER {
            return Ok(None);
        }
        Ok(Some(Span::new(answer, parsed.score)))
    }
}
