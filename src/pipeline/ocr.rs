//! Optical text recognition: turn one page image into plain text.
//!
//! [`Recognizer`] is the seam between the extractor and a concrete engine.
//! Implementations must not share mutable state between pages: the
//! extractor runs several `recognize` calls concurrently.
//!
//! [`TesseractRecognizer`] drives the `tesseract` executable. The page is
//! written to a temporary PNG, recognised with TSV output, and only the
//! word texts survive: bounding boxes and per-word confidences are dropped.

use crate::config::PipelineConfig;
use crate::error::{RecognitionError, RecognitionStage};
use crate::pipeline::encode::encode_png;
use crate::pipeline::render::PageImage;
use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// An optical recognition engine.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Short engine name for logs and stats.
    fn name(&self) -> &str;

    /// Recognise the text on one page. The returned text is raw; the
    /// extractor cleans it.
    async fn recognize(&self, page: &PageImage) -> Result<String, RecognitionError>;
}

/// Recogniser backed by the `tesseract` command-line program.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    command: PathBuf,
    language: String,
}

impl TesseractRecognizer {
    pub fn new(command: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.tesseract_cmd.clone(), config.ocr_language.clone())
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

#[async_trait]
impl Recognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(&self, page: &PageImage) -> Result<String, RecognitionError> {
        let page_num = page.page_num();
        let encode_err = |detail: String| RecognitionError::new(page_num, RecognitionStage::Encode, detail);

        let png = encode_png(&page.image).map_err(|e| encode_err(format!("PNG encoding failed: {e}")))?;

        // Removed when `tmp` drops at the end of this call.
        let mut tmp = tempfile::Builder::new()
            .prefix("docqa-page-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| encode_err(format!("tempfile: {e}")))?;
        tmp.write_all(&png)
            .and_then(|_| tmp.flush())
            .map_err(|e| encode_err(format!("tempfile write: {e}")))?;

        let output = Command::new(&self.command)
            .arg(tmp.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("tsv")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                RecognitionError::new(
                    page_num,
                    RecognitionStage::Engine,
                    format!("could not run '{}': {e}", self.command.display()),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognitionError::new(
                page_num,
                RecognitionStage::Engine,
                format!("tesseract exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let tsv = String::from_utf8(output.stdout).map_err(|e| {
            RecognitionError::new(
                page_num,
                RecognitionStage::Decode,
                format!("tesseract output is not UTF-8: {e}"),
            )
        })?;

        let text = words_from_tsv(&tsv);
        debug!("Page {}: tesseract recognised {} chars", page_num, text.chars().count());
        Ok(text)
    }
}

/// Rebuild page text from the word-level entries of Tesseract TSV output.
///
/// TSV columns: level page_num block_num par_num line_num word_num left top
/// width height conf text. Level 5 rows are words; rows with `conf == -1`
/// are layout containers and carry no text. Words on one text line are
/// joined with single spaces and lines with `\n`, so a word hyphenated at a
/// line end reaches post-processing as `infor-\nmation`.
pub fn words_from_tsv(tsv: &str) -> String {
    let mut out = String::new();
    let mut current_line: Option<(&str, &str, &str, &str)> = None;
    for line in tsv.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 || fields[0] != "5" {
            continue;
        }
        let conf: f32 = fields[10].trim().parse().unwrap_or(-1.0);
        let word = fields[11].trim();
        if conf < 0.0 || word.is_empty() {
            continue;
        }

        let key = (fields[1], fields[2], fields[3], fields[4]);
        match current_line {
            Some(prev) if prev == key => out.push(' '),
            Some(_) => out.push('\n'),
            None => {}
        }
        current_line = Some(key);
        out.push_str(word);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn tsv_keeps_only_word_rows() {
        let tsv = format!(
            "{HEADER}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t800\t600\t-1\t\n\
             4\t1\t1\t1\t1\t0\t10\t10\t200\t20\t-1\t\n\
             5\t1\t1\t1\t1\t1\t10\t10\t40\t20\t96.5\tThe\n\
             5\t1\t1\t1\t1\t2\t55\t10\t40\t20\t91.0\tsky\n\
             5\t1\t1\t1\t1\t3\t100\t10\t20\t20\t95\tis\n\
             5\t1\t1\t1\t1\t4\t125\t10\t40\t20\t88\tblue.\n"
        );
        assert_eq!(words_from_tsv(&tsv), "The sky is blue.");
    }

    #[test]
    fn tsv_skips_blank_and_negative_confidence_words() {
        let tsv = format!(
            "{HEADER}\n\
             5\t1\t1\t1\t1\t1\t0\t0\t1\t1\t-1\tghost\n\
             5\t1\t1\t1\t1\t2\t0\t0\t1\t1\t50\t \n\
             5\t1\t1\t1\t1\t3\t0\t0\t1\t1\t70\treal\n\
             garbage line\n"
        );
        assert_eq!(words_from_tsv(&tsv), "real");
    }

    #[test]
    fn tsv_lines_are_kept_apart() {
        let tsv = format!(
            "{HEADER}\n\
             5\t1\t1\t1\t1\t1\t10\t10\t40\t20\t90\tFull-text\n\
             5\t1\t1\t1\t1\t2\t60\t10\t40\t20\t90\tinfor-\n\
             5\t1\t1\t1\t2\t1\t10\t40\t40\t20\t90\tmation\n\
             5\t1\t1\t1\t2\t2\t60\t40\t40\t20\t90\tretrieval\n\
             5\t1\t2\t1\t1\t1\t10\t90\t40\t20\t90\tNext\n"
        );
        let text = words_from_tsv(&tsv);
        assert_eq!(text, "Full-text infor-\nmation retrieval\nNext");
        assert_eq!(
            crate::pipeline::postprocess::clean_page_text(&text),
            "Full-text information retrieval Next"
        );
    }

    #[test]
    fn tsv_blank_page_is_empty() {
        assert_eq!(words_from_tsv(HEADER), "");
        assert_eq!(words_from_tsv(""), "");
    }

    #[tokio::test]
    async fn missing_executable_is_an_engine_error() {
        let recognizer =
            TesseractRecognizer::new("/definitely/not/a/real/tesseract-binary", "eng");
        let page = PageImage::new(1, DynamicImage::new_rgb8(4, 4));

        let err = recognizer.recognize(&page).await.unwrap_err();
        assert_eq!(err.page, 2);
        assert_eq!(err.stage, RecognitionStage::Engine);
        assert!(err.detail.contains("could not run"), "got: {}", err.detail);
    }
}
