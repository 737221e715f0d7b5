// Exam-item generation (ENEM-style, five alternatives).
// All LLM calls go through llm_client; no direct Gemini calls here.

pub mod generator;
pub mod handlers;
pub mod prompts;
