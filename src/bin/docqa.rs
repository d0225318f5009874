//! CLI binary for edgequake-docqa.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints results.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_docqa::{
    extract_file, prepare, AnswerEngine, DocumentQa, EngineKind, ExtractionProgressCallback,
    PipelineConfig, ProgressCallback, QaAnswer, QaRequest, QaResponse, QaService, RecognizerKind,
    ServiceError,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per recognised page. Pages complete
/// out of order, so start times are keyed by page number.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_extraction_start` reports the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Rendering pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Reading");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Clear the bar if extraction aborted before completing.
    fn abandon(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Reading {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, total_pages: usize, recognised: usize) {
        self.bar.finish_and_clear();
        if self.errors.load(Ordering::SeqCst) == 0 {
            eprintln!(
                "{} {}/{} pages read",
                green("✔"),
                bold(&recognised.to_string()),
                total_pages
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Print the OCR text of a scanned PDF, one line per page
  docqa extract scan.pdf

  # Ask several questions about one document (text is extracted once)
  docqa ask invoice.pdf -q "What is the invoice number?" -q "What is the total?"

  # Answer from text you already have
  docqa answer --context "The sky is blue." -q "What color is the sky?"

  # French + English OCR, JSON output
  docqa --lang eng+fra ask contrat.pdf -q "Quelle est la date ?" --json

  # Use a remote extractive QA server
  docqa --engine remote --inference-url http://localhost:8000/qna/ ask doc.pdf -q "..."

  # Vision LLM instead of tesseract, LLM answering
  docqa --recognizer vision --engine llm --model gpt-4.1-mini ask doc.pdf -q "..."

ANSWERS:
  Every answer is a verbatim span of the document text. When no span
  answers the question the reply is:
    Sorry, I couldn't find an answer.

ENVIRONMENT VARIABLES:
  DOCQA_MAX_CONTEXT_LENGTH  Characters of text given to the answer engine
  DOCQA_OCR_LANG            Tesseract language(s), e.g. eng or eng+fra
  DOCQA_TESSERACT_CMD       Path to the tesseract executable
  DOCQA_INFERENCE_URL       Endpoint for --engine remote
  OPENAI_API_KEY            OpenAI API key (vision / llm modes)
  ANTHROPIC_API_KEY         Anthropic API key (vision / llm modes)
  EDGEQUAKE_PROVIDER        LLM provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL           LLM model ID
  PDFIUM_LIB_PATH           Path to libpdfium
  RUST_LOG                  Log filter, overrides --verbose / --quiet

SETUP:
  1. Install tesseract:  apt install tesseract-ocr   (or brew install tesseract)
  2. Install pdfium:     https://github.com/bblanchon/pdfium-binaries
  3. Ask:                docqa ask document.pdf -q "..."
"#;

/// Ask questions about scanned PDF documents.
#[derive(Parser, Debug)]
#[command(
    name = "docqa",
    version,
    about = "Ask questions about scanned PDF documents",
    long_about = "Extract text from PDF documents (local files or URLs) with OCR and answer \
questions with an extractive engine: answers are always copied from the document.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalOpts {
    /// Maximum characters of document text handed to the answer engine.
    #[arg(long, global = true, env = "DOCQA_MAX_CONTEXT_LENGTH", default_value_t = 4000)]
    max_context_length: usize,

    /// Tesseract language(s), e.g. eng or eng+fra.
    #[arg(long = "lang", global = true, env = "DOCQA_OCR_LANG", default_value = "eng")]
    lang: String,

    /// Path to the tesseract executable.
    #[arg(long, global = true, env = "DOCQA_TESSERACT_CMD", default_value = "tesseract")]
    tesseract_cmd: PathBuf,

    /// Page recogniser.
    #[arg(long, global = true, env = "DOCQA_RECOGNIZER", value_enum, default_value = "tesseract")]
    recognizer: RecognizerArg,

    /// Rendering DPI (72–600).
    #[arg(long, global = true, env = "DOCQA_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Pages recognised concurrently.
    #[arg(short, long, global = true, env = "DOCQA_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// PDF user password for encrypted documents.
    #[arg(long, global = true, env = "DOCQA_PASSWORD")]
    password: Option<String>,

    /// Answer engine.
    #[arg(long, global = true, env = "DOCQA_ENGINE", value_enum, default_value = "lexical")]
    engine: EngineArg,

    /// Endpoint of the extractive QA server (for --engine remote).
    #[arg(long, global = true, env = "DOCQA_INFERENCE_URL")]
    inference_url: Option<String>,

    /// LLM provider for vision OCR / LLM answering: openai, anthropic, gemini, ollama.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (default: gpt-4.1-nano).
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Timeout in seconds for each inference / LLM call.
    #[arg(long, global = true, env = "DOCQA_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, global = true, env = "DOCQA_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Retries on transient LLM failures.
    #[arg(long, global = true, env = "DOCQA_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCQA_VERBOSE")]
    verbose: bool,

    /// Suppress all output except results and errors.
    #[arg(long, global = true, env = "DOCQA_QUIET")]
    quiet: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "DOCQA_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the OCR text of a PDF, one line per page.
    Extract {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,

        /// Output the full extraction (pages, stats) as JSON.
        #[arg(long)]
        json: bool,

        /// Write the text to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract a PDF once, then answer each question against it.
    Ask {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,

        /// Question to answer; repeat for several.
        #[arg(short = 'q', long = "question", required = true)]
        questions: Vec<String>,

        /// Output answers as JSON.
        #[arg(long)]
        json: bool,

        /// Print the extracted context before the answers.
        #[arg(long)]
        show_text: bool,
    },

    /// Answer a question from text supplied directly.
    Answer {
        /// Context text.
        #[arg(long, conflicts_with = "context_file", required_unless_present = "context_file")]
        context: Option<String>,

        /// Read the context from this file.
        #[arg(long)]
        context_file: Option<PathBuf>,

        /// Question to answer.
        #[arg(short = 'q', long)]
        question: String,

        /// Output the answer as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum RecognizerArg {
    Tesseract,
    Vision,
}

impl From<RecognizerArg> for RecognizerKind {
    fn from(v: RecognizerArg) -> Self {
        match v {
            RecognizerArg::Tesseract => RecognizerKind::Tesseract,
            RecognizerArg::Vision => RecognizerKind::Vision,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EngineArg {
    Lexical,
    Remote,
    Llm,
}

impl From<EngineArg> for EngineKind {
    fn from(v: EngineArg) -> Self {
        match v {
            EngineArg::Lexical => EngineKind::Lexical,
            EngineArg::Remote => EngineKind::Remote,
            EngineArg::Llm => EngineKind::Llm,
        }
    }
}

impl Command {
    fn json(&self) -> bool {
        match self {
            Command::Extract { json, .. }
            | Command::Ask { json, .. }
            | Command::Answer { json, .. } => *json,
        }
    }

    fn reads_document(&self) -> bool {
        !matches!(self, Command::Answer { .. })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let opts = &cli.opts;

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO-level library logs are hidden while the progress bar is shown.
    let show_progress =
        !opts.quiet && !opts.no_progress && !cli.command.json() && cli.command.reads_document();
    let filter = if opts.verbose {
        "debug"
    } else if opts.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress = if show_progress {
        Some(CliProgressCallback::new_dynamic())
    } else {
        None
    };
    let config = build_config(opts, progress.clone().map(|cb| cb as ProgressCallback))?;

    let result = run(&cli, &config).await;
    if let Some(cb) = progress {
        cb.abandon();
    }
    result
}

async fn run(cli: &Cli, config: &PipelineConfig) -> Result<()> {
    match &cli.command {
        Command::Extract {
            input,
            json,
            output,
        } => {
            // Extraction only: no answer engine is built.
            let extracted = extract_file(input, config)
                .await
                .with_context(|| format!("Text extraction failed for '{input}'"))?;
            let extracted = &extracted;

            let rendered = if *json {
                serde_json::to_string_pretty(extracted).context("Failed to serialise output")?
            } else {
                extracted.text.clone()
            };

            match output {
                Some(path) => {
                    tokio::fs::write(path, rendered.as_bytes())
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    if !cli.opts.quiet {
                        eprintln!(
                            "{}  {} pages  {} chars  {}ms  →  {}",
                            green("✔"),
                            extracted.stats.total_pages,
                            extracted.stats.total_chars,
                            extracted.stats.total_duration_ms,
                            bold(&path.display().to_string()),
                        );
                    }
                }
                None => write_stdout(&rendered)?,
            }
        }

        Command::Ask {
            input,
            questions,
            json,
            show_text,
        } => {
            let qa = DocumentQa::from_config(config).context("Failed to initialise pipeline")?;
            let doc = qa
                .prepare_input(input)
                .await
                .with_context(|| format!("Text extraction failed for '{input}'"))?;

            if doc.context.truncated && !cli.opts.quiet {
                eprintln!(
                    "{} document text truncated to {} characters",
                    cyan("⚠"),
                    config.max_context_length
                );
            }
            if *show_text && !*json {
                println!("{}\n", dim(&doc.context.text));
            }

            let mut answers = Vec::with_capacity(questions.len());
            for question in questions {
                let answer = qa.ask(&doc, question).await.map_err(describe_service_error)?;
                answers.push((question.as_str(), answer));
            }

            if *json {
                let items: Vec<_> = answers
                    .iter()
                    .map(|(q, a)| serde_json::json!({ "question": q, "response": QaResponse::from(a) }))
                    .collect();
                let mut out = serde_json::json!({
                    "input": input,
                    "truncated": doc.context.truncated,
                    "answers": items,
                });
                if *show_text {
                    out["context"] = serde_json::Value::String(doc.context.text.clone());
                }
                write_stdout(&serde_json::to_string_pretty(&out).context("Failed to serialise output")?)?;
            } else {
                for (question, answer) in &answers {
                    print_answer(question, answer, questions.len() > 1);
                }
            }
        }

        Command::Answer {
            context,
            context_file,
            question,
            json,
        } => {
            let text = match (context, context_file) {
                (Some(text), _) => text.clone(),
                (None, Some(path)) => tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read context from {}", path.display()))?,
                (None, None) => return Err(anyhow!("Either --context or --context-file is required")),
            };

            // No document involved: only the answer engine is built.
            let engine = Arc::new(
                AnswerEngine::from_config(config).context("Failed to initialise answer engine")?,
            );
            let service = QaService::new(engine);
            let context =
                prepare(&text, config.max_context_length).context("Invalid context length")?;
            let answer = service
                .handle(&QaRequest::new(context.text, question.clone()))
                .await
                .map_err(describe_service_error)?;

            if *json {
                write_stdout(
                    &serde_json::to_string_pretty(&QaResponse::from(&answer))
                        .context("Failed to serialise output")?,
                )?;
            } else {
                print_answer(question, &answer, false);
            }
        }
    }

    Ok(())
}

/// Keep request problems and engine problems apart in the error chain.
fn describe_service_error(e: ServiceError) -> anyhow::Error {
    match e {
        ServiceError::Validation(v) => anyhow::Error::new(v).context("Invalid request"),
        ServiceError::Inference(i) => anyhow::Error::new(i).context("Answer engine failed"),
        ServiceError::Context(c) => anyhow::Error::new(c).context("Invalid context limit"),
    }
}

fn print_answer(question: &str, answer: &QaAnswer, with_question: bool) {
    if with_question {
        println!("{} {}", bold("Q:"), question);
    }
    match answer {
        QaAnswer::Found { text, score } => {
            let score = score
                .map(|s| dim(&format!("  ({s:.2})")))
                .unwrap_or_default();
            println!("{}{}", green(text), score);
        }
        QaAnswer::NotFound => println!("{}", red(answer.text())),
    }
}

fn write_stdout(s: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(s.as_bytes())
        .context("Failed to write to stdout")?;
    if !s.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(opts: &GlobalOpts, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .max_context_length(opts.max_context_length)
        .ocr_language(opts.lang.clone())
        .tesseract_cmd(opts.tesseract_cmd.clone())
        .recognizer(opts.recognizer.into())
        .dpi(opts.dpi)
        .concurrency(opts.concurrency)
        .engine(opts.engine.into())
        .api_timeout_secs(opts.api_timeout)
        .download_timeout_secs(opts.download_timeout)
        .max_retries(opts.max_retries);

    if let Some(ref pwd) = opts.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref url) = opts.inference_url {
        builder = builder.inference_url(url.clone());
    }
    if let Some(ref p) = opts.provider {
        builder = builder.provider_name(p.clone());
    }
    if let Some(ref m) = opts.model {
        builder = builder.model(m.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
