//! Configuration for the document QA pipeline.
//!
//! Every knob lives in [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. The same config drives text extraction,
//! context preparation and answer-engine construction, so one value can be
//! shared across threads and logged as a whole.

use crate::error::DocQaError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default model used when an LLM-backed stage has no explicit model.
pub const DEFAULT_LLM_MODEL: &str = "gpt-4.1-nano";

/// Configuration for extraction and question answering.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docqa::{EngineKind, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .dpi(300)
///     .ocr_language("eng+fra")
///     .max_context_length(2000)
///     .engine(EngineKind::Lexical)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Rendering DPI used when rasterising each page. Range: 72–600. Default: 200.
    ///
    /// Tesseract is tuned for roughly 300 DPI input; 200 keeps body text
    /// legible while halving the pixel count. Raise it for small fonts.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 4096.
    ///
    /// Caps either edge, scaling the other proportionally, so a poster-sized
    /// page cannot exhaust memory regardless of DPI.
    pub max_rendered_pixels: u32,

    /// Number of pages recognised concurrently. Default: 4.
    pub concurrency: usize,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Which optical recognition backend reads the page images.
    pub recognizer: RecognizerKind,

    /// Tesseract language identifier(s), e.g. `eng` or `eng+fra`. Default: `eng`.
    pub ocr_language: String,

    /// Path or name of the `tesseract` executable. Default: `tesseract`.
    pub tesseract_cmd: PathBuf,

    /// Maximum number of characters of extracted text handed to the answer
    /// engine. Default: 4000.
    pub max_context_length: usize,

    /// Which answer engine backs the QA model.
    pub engine: EngineKind,

    /// Endpoint of an out-of-process inference server
    /// (required for [`EngineKind::Remote`]).
    pub inference_url: Option<String>,

    /// LLM model identifier for vision OCR and LLM answering.
    /// If None, uses [`DEFAULT_LLM_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for LLM calls. Default: 0.0.
    ///
    /// Transcription and span copying must be faithful, not creative.
    pub temperature: f32,

    /// Maximum tokens an LLM may generate per page transcription. Default: 4096.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient LLM failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-call timeout for the inference server and LLM APIs, in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Optional per-page extraction progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_rendered_pixels: 4096,
            concurrency: 4,
            password: None,
            recognizer: RecognizerKind::default(),
            ocr_language: "eng".to_string(),
            tesseract_cmd: PathBuf::from("tesseract"),
            max_context_length: 4000,
            engine: EngineKind::default(),
            inference_url: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            download_timeout_secs: 120,
            api_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("recognizer", &self.recognizer)
            .field("ocr_language", &self.ocr_language)
            .field("tesseract_cmd", &self.tesseract_cmd)
            .field("max_context_length", &self.max_context_length)
            .field("engine", &self.engine)
            .field("inference_url", &self.inference_url)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_retries", &self.max_retries)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The LLM model to use, falling back to [`DEFAULT_LLM_MODEL`].
    pub fn llm_model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_LLM_MODEL)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn recognizer(mut self, kind: RecognizerKind) -> Self {
        self.config.recognizer = kind;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn tesseract_cmd(mut self, cmd: impl Into<PathBuf>) -> Self {
        self.config.tesseract_cmd = cmd.into();
        self
    }

    /// Not clamped: zero is rejected by [`Self::build`].
    pub fn max_context_length(mut self, n: usize) -> Self {
        self.config.max_context_length = n;
        self
    }

    pub fn engine(mut self, kind: EngineKind) -> Self {
        self.config.engine = kind;
        self
    }

    pub fn inference_url(mut self, url: impl Into<String>) -> Self {
        self.config.inference_url = Some(url.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, DocQaError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(DocQaError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(DocQaError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_context_length == 0 {
            return Err(DocQaError::InvalidConfig(
                "Maximum context length must be ≥ 1".into(),
            ));
        }
        if !is_valid_language(&c.ocr_language) {
            return Err(DocQaError::InvalidConfig(format!(
                "OCR language must look like 'eng' or 'eng+fra', got '{}'",
                c.ocr_language
            )));
        }
        if c.engine == EngineKind::Remote {
            match c.inference_url.as_deref() {
                None => {
                    return Err(DocQaError::InvalidConfig(
                        "The remote engine needs an inference URL (--inference-url)".into(),
                    ))
                }
                Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                    return Err(DocQaError::InvalidConfig(format!(
                        "Inference URL must be http:// or https://, got '{url}'"
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(self.config)
    }
}

/// Tesseract language codes: `eng`, `chi_sim`, `eng+fra`.
fn is_valid_language(lang: &str) -> bool {
    !lang.is_empty()
        && lang.split('+').all(|code| {
            !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Optical recognition backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognizerKind {
    /// Local `tesseract` executable. (default)
    #[default]
    Tesseract,
    /// Vision LLM transcription through `edgequake-llm`.
    Vision,
}

/// Answer engine backing the QA model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// In-process lexical span selector. No network, deterministic. (default)
    #[default]
    Lexical,
    /// Out-of-process extractive QA server reached over HTTP.
    Remote,
    /// An LLM prompted to copy a verbatim span from the context.
    Llm,
}
