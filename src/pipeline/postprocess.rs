//! Post-processing: deterministic cleanup of recognised page text.
//!
//! Recognition output carries artefacts that are noise for question
//! answering: Windows line endings, zero-width characters, a BOM, soft
//! hyphens, and layout whitespace. Every page is reduced to a single line of
//! space-separated words, which also keeps the assembled document at exactly
//! one newline-terminated segment per page.
//!
//! Rules (applied in order):
//! 1. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, …)
//! 2. Re-join words hyphenated across a line break (`infor-\nmation`)
//! 3. Collapse every whitespace run, newlines included, to one space
//! 4. Trim both ends

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to one page of recognised text.
pub fn clean_page_text(input: &str) -> String {
    let s = remove_invisible_chars(input);
    let s = join_hyphenated_breaks(&s);
    let s = collapse_whitespace(&s);
    s.trim().to_string()
}

// ── Rule 1: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 2: Re-join words split across lines ────────────────────────────────

static RE_HYPHEN_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{L})-[ \t]*\r?\n[ \t]*(\p{Ll})").unwrap());

fn join_hyphenated_breaks(input: &str) -> String {
    RE_HYPHEN_BREAK.replace_all(input, "$1$2").to_string()
}

// ── Rule 3: Collapse whitespace ─────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input, " ").to_string()
}
