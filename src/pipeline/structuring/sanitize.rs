//! Cleanup of raw model replies before they reach the parsers.
//!
//! Local reasoning models served through Ollama prefix their answer with a
//! thinking block. Left in place, a numbered step inside that block would be
//! read as a participant.

use std::sync::LazyLock;

use regex::Regex;

static THINK_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));

static UNUSED_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<unused\d+>").expect("valid regex"));

/// Strip model artifacts from a raw reply.
///
/// Handles:
/// 1. `<think>...</think>` blocks (DeepSeek-R1, Qwen3)
/// 2. Gemma thinking prefix (`<unusedN>thought\n...`)
/// 3. Stray `<unusedN>` tokens
pub fn sanitize_llm_output(raw: &str) -> String {
    let mut text = THINK_BLOCK_RE.replace_all(raw, "").into_owned();

    // An unterminated think block means the reply was cut off mid-thought;
    // nothing after the opening tag is an answer.
    if let Some(idx) = text.find("<think>") {
        text.truncate(idx);
    }

    if let Some(idx) = text.find("<unused") {
        if let Some(thought_offset) = text[idx..].find("thought\n") {
            text = text[idx + thought_offset + "thought\n".len()..].to_string();
        }
    }

    text = UNUSED_TOKEN_RE.replace_all(&text, "").into_owned();

    text.trim().to_string()
}

/// First `max_chars` characters of a reply for logs and failure reports.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_think_block() {
        let raw = "<think>\n1. Maybe the clerk?\n2. Or the auditor\n</think>\n\n\
                   1. Clerk\n2. Auditor";
        assert_eq!(sanitize_llm_output(raw), "1. Clerk\n2. Auditor");
    }

    #[test]
    fn unterminated_think_block_drops_tail() {
        let raw = "<think>\n1. partial reasoning";
        assert_eq!(sanitize_llm_output(raw), "");
    }

    #[test]
    fn strips_gemma_thinking_prefix() {
        let raw = "<unused94>thought\nLet me list them.\n1. Operator";
        assert_eq!(sanitize_llm_output(raw), "Let me list them.\n1. Operator");
    }

    #[test]
    fn strips_unused_tokens() {
        let raw = "| A |<unused3> B |";
        assert_eq!(sanitize_llm_output(raw), "| A | B |");
    }

    #[test]
    fn clean_text_unchanged() {
        let text = "| A | B |\n|---|---|\n| 1 | 2 |";
        assert_eq!(sanitize_llm_output(text), text);
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("short", 10), "short");
        assert_eq!(excerpt("abcdef", 3), "abc...");
        assert_eq!(excerpt("ééééé", 2), "éé...");
        assert_eq!(excerpt("", 5), "");
    }
}
