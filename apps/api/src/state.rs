use std::sync::Arc;

use crate::analysis::pipeline::{AnalysisPipeline, PipelineSettings};
use crate::config::Config;
use crate::llm_client::Generator;

/// Shared application state injected into all route handlers via Axum extractors.
/// Built once at start-up and never mutated.
#[derive(Clone)]
pub struct AppState {
    /// The remote-model handle. `LlmClient` in production, a fake in tests.
    pub llm: Arc<dyn Generator>,
    pub pipeline: AnalysisPipeline,
    pub config: Config,
}

impl AppState {
    pub fn new(llm: Arc<dyn Generator>, config: Config) -> Self {
        let pipeline = AnalysisPipeline::new(llm.clone(), PipelineSettings::from_config(&config));
        Self {
            llm,
            pipeline,
            config,
        }
    }
}
