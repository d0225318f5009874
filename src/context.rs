//! Context preparation: bound extracted text to the answer engine's input limit.
//!
//! Truncation keeps a prefix of the assembled text and appends
//! [`TRUNCATION_MARKER`], so the visible length may exceed `max_length` by
//! the marker's length. Counting is by `char`, never by byte, so a
//! multi-byte character is never split. Page boundaries are not
//! re-derived here.

use crate::document::ExtractedText;
use crate::error::ContextError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Appended to a truncated context so callers can see truncation happened.
pub const TRUNCATION_MARKER: &str = "\n[... truncated]";

/// Extracted text, possibly cut down to fit the engine's input limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedContext {
    pub text: String,
    pub truncated: bool,
}

impl BoundedContext {
    /// Bound the text of a whole extraction.
    pub fn from_extracted(
        extracted: &ExtractedText,
        max_length: usize,
    ) -> Result<Self, ContextError> {
        prepare(&extracted.text, max_length)
    }

    /// The text without the truncation marker.
    pub fn body(&self) -> &str {
        if self.truncated {
            self.text
                .strip_suffix(TRUNCATION_MARKER)
                .unwrap_or(&self.text)
        } else {
            &self.text
        }
    }
}

/// Bound `text` to at most `max_length` characters (plus the marker).
pub fn prepare(text: &str, max_length: usize) -> Result<BoundedContext, ContextError> {
    if max_length == 0 {
        return Err(ContextError::InvalidMaxLength);
    }

    // Byte offset of the first char past the limit; None means it all fits.
    match text.char_indices().nth(max_length) {
        None => Ok(BoundedContext {
            text: text.to_string(),
            truncated: false,
        }),
        Some((cut, _)) => {
            debug!(
                "Truncating context from {} to {} chars",
                text.chars().count(),
                max_length
            );
            let mut bounded = String::with_capacity(cut + TRUNCATION_MARKER.len());
            bounded.push_str(&text[..cut]);
            bounded.push_str(TRUNCATION_MARKER);
            Ok(BoundedContext {
                text: bounded,
                truncated: true,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_unchanged() {
        let ctx = prepare("The sky is blue.", 100).unwrap();
        assert_eq!(ctx.text, "The sky is blue.");
        assert!(!ctx.truncated);
    }

    #[test]
    fn exact_length_is_not_truncated() {
        let ctx = prepare("abcd", 4).unwrap();
        assert_eq!(ctx.text, "abcd");
        assert!(!ctx.truncated);
    }

    #[test]
    fn long_text_keeps_prefix_and_marker() {
        let text: String = (0..10_000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let ctx = prepare(&text, 4000).unwrap();

        assert!(ctx.truncated);
        assert!(ctx.text.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            ctx.text.chars().count(),
            4000 + TRUNCATION_MARKER.chars().count()
        );
        assert_eq!(ctx.body(), &text[..4000]);
    }

    #[test]
    fn never_splits_multibyte_chars() {
        let text = "héllo wörld ünïcode";
        let ctx = prepare(text, 2).unwrap();
        assert!(ctx.truncated);
        assert_eq!(ctx.body(), "hé");

        let emoji = "🦀🦀🦀";
        let ctx = prepare(emoji, 1).unwrap();
        assert_eq!(ctx.body(), "🦀");
    }

    #[test]
    fn zero_max_length_is_rejected() {
        assert_eq!(prepare("anything", 0), Err(ContextError::InvalidMaxLength));
    }

    #[test]
    fn empty_text_is_fine() {
        let ctx = prepare("", 10).unwrap();
        assert_eq!(ctx.text, "");
        assert!(!ctx.truncated);
    }

    #[test]
    fn body_of_untruncated_context_is_whole_text() {
        let ctx = prepare("short", 10).unwrap();
        assert_eq!(ctx.body(), "short");
    }
}
