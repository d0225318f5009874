//! In-process lexical answer model.
//!
//! No network and no weights: a question is answered from the sentence that
//! shares the most content words with it and still has words the question
//! lacks. Within that sentence the answer
//! is the longest run of words the question does not already contain. This
//! handles the common "What is the X of Y?" → "… Y's X is Z." pattern and
//! refuses everything else, which is the right failure mode for an
//! extractive engine.

use super::{QaModel, Span};
use crate::error::InferenceError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::ops::Range;

static RE_SENTENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^.!?\n]+[.!?]?").unwrap());

static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+(?:[-'’]\w+)*").unwrap());

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be",
        "because", "been", "before", "being", "between", "both", "but", "by", "can", "could",
        "did", "do", "does", "doing", "during", "each", "for", "from", "had", "has", "have",
        "having", "he", "her", "here", "hers", "him", "his", "how", "i", "if", "in", "into", "is",
        "it", "its", "me", "may", "might", "more", "most", "must", "my", "no", "nor", "not", "of",
        "off", "on", "once", "only", "or", "other", "our", "ours", "out", "over", "own", "same",
        "shall", "she", "should", "so", "some", "such", "than", "that", "the", "their", "theirs",
        "them", "then", "there", "these", "they", "this", "those", "through", "to", "too",
        "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
        "while", "who", "whom", "whose", "why", "will", "with", "would", "you", "your", "yours",
    ]
    .into_iter()
    .collect()
});

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(word)
}

/// Lower-cased words of `text` with their byte ranges.
fn words(text: &str) -> impl Iterator<Item = (String, Range<usize>)> + '_ {
    RE_WORD
        .find_iter(text)
        .map(|m| (m.as_str().to_lowercase(), m.range()))
}

/// Longest run of words in `sentence` that are neither stopwords nor in the
/// question, first on ties.
fn longest_new_run(sentence: &str, question_words: &HashSet<String>) -> Option<Range<usize>> {
    let mut best_run: Option<(usize, Range<usize>)> = None;
    let mut run: Option<(usize, Range<usize>)> = None;
    for (word, range) in words(sentence) {
        if question_words.contains(&word) || is_stopword(&word) {
            run = None;
            continue;
        }
        let current = match run.take() {
            Some((len, r)) => (len + 1, r.start..range.end),
            None => (1, range),
        };
        if best_run.as_ref().is_none_or(|(len, _)| current.0 > *len) {
            best_run = Some(current.clone());
        }
        run = Some(current);
    }
    best_run.map(|(_, span)| span)
}

/// Deterministic sentence-overlap span selector.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalModel;

impl LexicalModel {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous core of [`QaModel::predict`].
    pub fn select(&self, context: &str, question: &str) -> Option<Span> {
        let question_words: HashSet<String> = words(question).map(|(w, _)| w).collect();
        let content: HashSet<&str> = question_words
            .iter()
            .map(String::as_str)
            .filter(|w| !is_stopword(w))
            .collect();
        if content.is_empty() {
            return None;
        }

        // Best sentence: most distinct content words among those holding a
        // candidate run, earliest on ties.
        let mut best: Option<(usize, Range<usize>, Range<usize>)> = None;
        for m in RE_SENTENCE.find_iter(context) {
            let seen: HashSet<String> = words(m.as_str()).map(|(w, _)| w).collect();
            let overlap = content.iter().filter(|w| seen.contains(**w)).count();
            if overlap == 0 || best.as_ref().is_some_and(|(n, _, _)| overlap <= *n) {
                continue;
            }
            if let Some(span) = longest_new_run(m.as_str(), &question_words) {
                best = Some((overlap, m.range(), span));
            }
        }
        let (overlap, sentence, span) = best?;
        let offset = sentence.start;

        let text = &context[offset + span.start..offset + span.end];
        Some(Span::new(
            text,
            Some(overlap as f32 / content.len() as f32),
        ))
    }
}

#[async_trait]
impl QaModel for LexicalModel {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn predict(
        &self,
        context: &str,
        question: &str,
    ) -> Result<Option<Span>, InferenceError> {
        Ok(self.select(context, question))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(context: &str, question: &str) -> Option<String> {
        LexicalModel::new().select(context, question).map(|s| s.text)
    }

    #[test]
    fn colour_of_the_sky() {
        let span = LexicalModel::new()
            .select("The sky is blue.", "What color is the sky?")
            .unwrap();
        assert_eq!(span.text, "blue");
        assert_eq!(span.score, Some(0.5));
    }

    #[test]
    fn unrelated_question_finds_nothing() {
        assert_eq!(answer("The sky is blue.", "What is the capital of France?"), None);
    }

    #[test]
    fn picks_the_sentence_with_most_overlap() {
        let ctx = "Alice was born in 1990. Bob was born in Paris.";
        assert_eq!(answer(ctx, "Where was Bob born?").as_deref(), Some("Paris"));
        assert_eq!(answer(ctx, "When was Alice born?").as_deref(), Some("1990"));
    }

    #[test]
    fn earliest_sentence_wins_ties() {
        let ctx = "The invoice total is 120 EUR. The invoice total was disputed.";
        assert_eq!(
            answer(ctx, "What is the invoice total?").as_deref(),
            Some("120 EUR")
        );
    }

    #[test]
    fn multi_word_run_keeps_original_spacing() {
        let ctx = "Invoice   number:  INV-2024 0042 issued today";
        let got = answer(ctx, "What is the invoice number?").unwrap();
        assert!(ctx.contains(&got));
        assert_eq!(got, "INV-2024 0042 issued today");
    }

    #[test]
    fn stopword_only_question_finds_nothing() {
        assert_eq!(answer("The sky is blue.", "What is it?"), None);
    }

    #[test]
    fn sentence_with_only_question_words_finds_nothing() {
        assert_eq!(answer("The sky.", "What about the sky?"), None);
    }

    #[test]
    fn skips_sentence_that_only_repeats_the_question() {
        assert_eq!(
            answer("The sky. The sky is blue.", "What color is the sky?").as_deref(),
            Some("blue")
        );
    }

    #[test]
    fn deterministic() {
        let ctx = "Rust was first released in 2015. It is fast.";
        let q = "When was Rust first released?";
        assert_eq!(answer(ctx, q), answer(ctx, q));
        assert_eq!(answer(ctx, q).as_deref(), Some("2015"));
    }
}
