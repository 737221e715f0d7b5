// Answer-sheet analysis: batch the roster, have the model correct each batch,
// scrape the replies, and merge them into one report with recomputed statistics.
// All LLM calls go through llm_client; no direct Gemini calls here.

pub mod aggregator;
pub mod batcher;
pub mod error;
pub mod extractor;
pub mod handlers;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod roster;
