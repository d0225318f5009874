//! Prompts for the LLM-backed stages.
//!
//! Kept in one place so tests can inspect them and so prompt changes never
//! touch retry or error-handling code.

/// System prompt for transcribing a page image to plain text.
pub const TRANSCRIPTION_PROMPT: &str = r#"You are an OCR engine. Transcribe ALL text visible in the page image.

Rules:
1. Output plain text only. No Markdown, no HTML, no code fences.
2. Preserve reading order as a human would read the page.
3. Copy text exactly; do not correct, summarise, translate or explain.
4. Ignore decorative elements that carry no text.
5. If the page contains no text, output nothing."#;

/// Reply the answer model must give when the context has no answer.
pub const NO_ANSWER_TOKEN: &str = "NO_ANSWER";

/// System prompt for extractive question answering.
pub const EXTRACTIVE_QA_PROMPT: &str = r#"You answer questions using ONLY the supplied context.

Rules:
1. The answer MUST be a short span copied verbatim from the context.
2. Never use outside knowledge. Never paraphrase, explain or add words.
3. Prefer the shortest span that fully answers the question.
4. If the context does not contain the answer, reply exactly: NO_ANSWER"#;

/// Build the user message carrying the context and the question.
pub fn extractive_qa_message(context: &str, question: &str) -> String {
    format!(
        "Context:\n\"\"\"\n{}\n\"\"\"\n\nQuestion: {}\nAnswer:",
        context, question
    )
}
