//! Tolerant location of ```json fenced blocks in free-form model output.
//!
//! Two stages, each with its own failure:
//! 1. `locate_json_fence` finds the fenced region (closing fence optional).
//! 2. `narrow_to_delimiters` trims the region to the outermost bracket pair,
//!    dropping any prose the model put inside the fence.
//!
//! Strict parsing of the narrowed payload is left to the caller.

use std::sync::OnceLock;

use regex::Regex;

/// Opening fence tagged `json` (any case, any spacing), lazily matched up to
/// the next fence or, when the reply was truncated, the end of the text.
const JSON_FENCE_PATTERN: &str = r"(?is)```[ \t]*json\b(?P<body>.*?)(?P<close>```|\z)";

fn json_fence() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(JSON_FENCE_PATTERN).expect("JSON fence pattern is valid"))
}

/// A located fenced region within a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FencedBlock<'a> {
    /// Text between the opening tag and the closing fence, untrimmed.
    pub body: &'a str,
    /// Byte offset just past the closing fence (or the end of the text).
    pub end: usize,
    /// False when the closing fence was missing.
    pub closed: bool,
}

/// Finds the first ```json fenced block in `text`.
pub fn locate_json_fence(text: &str) -> Option<FencedBlock<'_>> {
    let captures = json_fence().captures(text)?;
    let body = captures.name("body")?;
    let close = captures.name("close")?;
    Some(FencedBlock {
        body: body.as_str(),
        end: close.end(),
        closed: !close.as_str().is_empty(),
    })
}

/// Narrows `body` to the substring from the first `open` to the last `close`,
/// inclusive. Returns `None` when the pair is missing or inverted.
pub fn narrow_to_delimiters(body: &str, open: char, close: char) -> Option<&str> {
    let first = body.find(open)?;
    let last = body.rfind(close)?;
    if last < first {
        return None;
    }
    Some(&body[first..last + close.len_utf8()])
}

/// Returns at most `max_chars` characters of `text`, marking truncation with `...`.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        text.chars().take(max_chars).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locates_fence_on_separate_lines() {
        let text = "Here you go:\n```json\n[{\"a\": 1}]\n```\nDone.";
        let block = locate_json_fence(text).unwrap();
        assert_eq!(block.body.trim(), "[{\"a\": 1}]");
        assert!(block.closed);
        assert_eq!(&text[block.end..], "\nDone.");
    }

    #[test]
    fn test_locates_fence_on_single_line() {
        let text = "```json [1, 2, 3] ``` **Mean:** 2";
        let block = locate_json_fence(text).unwrap();
        assert_eq!(block.body.trim(), "[1, 2, 3]");
        assert_eq!(text[block.end..].trim(), "**Mean:** 2");
    }

    #[test]
    fn test_tag_is_case_insensitive_and_spacing_tolerant() {
        let text = "```  JSON\r\n[]\r\n```";
        let block = locate_json_fence(text).unwrap();
        assert_eq!(block.body.trim(), "[]");
    }

    #[test]
    fn test_truncated_fence_runs_to_end_of_text() {
        let text = "```json\n[{\"a\": 1}, {\"a\": 2";
        let block = locate_json_fence(text).unwrap();
        assert!(!block.closed);
        assert_eq!(block.end, text.len());
        assert!(block.body.contains("\"a\": 2"));
    }

    #[test]
    fn test_untagged_fence_is_not_json() {
        assert!(locate_json_fence("```\n[1]\n```").is_none());
        assert!(locate_json_fence("```text\n[1]\n```").is_none());
        assert!(locate_json_fence("no fences at all").is_none());
    }

    #[test]
    fn test_only_first_json_fence_is_taken() {
        let text = "```json\n[1]\n```\ntext\n```json\n[2]\n```";
        let block = locate_json_fence(text).unwrap();
        assert_eq!(block.body.trim(), "[1]");
    }

    #[test]
    fn test_narrow_strips_prose_inside_fence() {
        let body = "relatorio_alunos = [ {\"x\": [1]} ] // end";
        assert_eq!(
            narrow_to_delimiters(body, '[', ']'),
            Some("[ {\"x\": [1]} ]")
        );
    }

    #[test]
    fn test_narrow_rejects_missing_or_inverted_pair() {
        assert_eq!(narrow_to_delimiters("no brackets", '[', ']'), None);
        assert_eq!(narrow_to_delimiters("] backwards [", '[', ']'), None);
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        assert_eq!(excerpt("ação", 2), "aç...");
        assert_eq!(excerpt("short", 10), "short");
    }
}
