// Answer-sheet image reading: one vision call per uploaded sheet.
// All LLM calls go through llm_client; no direct Gemini calls here.

pub mod handlers;
pub mod prompts;
pub mod reader;
