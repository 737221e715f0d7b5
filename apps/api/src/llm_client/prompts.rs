// Shared prompt fragments and prompt-building utilities.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// Instruction appended to every prompt whose reply is scraped for a fenced JSON block.
pub const FENCED_JSON_INSTRUCTION: &str = "\
    The structured part of your answer MUST be a single markdown code block \
    opened with ```json and closed with ```. \
    Put valid JSON only inside that block: no comments, no trailing commas, \
    no text before the opening bracket or after the closing bracket.";

/// Pretty JSON for embedding data in a prompt. Input here is always built from
/// `serde_json::Value`, which cannot fail to serialise; anything that does is embedded as `null`.
pub fn to_prompt_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}
