//! Analysis pipeline: orchestrates one request end to end.
//!
//! Flow: Roster::from_content → batches → per batch (build_batch_request →
//!       Generator::generate → extract) → aggregate.
//!
//! Batches run sequentially, all at once, or with a bounded number in flight.
//! The mode changes latency only: results are always aggregated in batch
//! order, and the first failing batch fails the whole request.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::try_join_all;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;
use tracing::{info, warn};

use crate::analysis::aggregator::{aggregate, FinalReport};
use crate::analysis::batcher::{batches, Batch};
use crate::analysis::error::AnalysisError;
use crate::analysis::extractor::{extract, BatchExtraction, BatchResponse};
use crate::analysis::prompts::{build_batch_request, GenerationSettings};
use crate::analysis::roster::Roster;
use crate::config::Config;
use crate::llm_client::Generator;

/// How batch calls are scheduled against the remote model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchConcurrency {
    /// One call in flight; batch N+1 is submitted after batch N is extracted.
    Sequential,
    /// Every batch submitted at once and awaited jointly.
    Concurrent,
    /// At most this many calls in flight.
    Bounded(usize),
}

impl FromStr for BatchConcurrency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "concurrent" => Ok(Self::Concurrent),
            other => match other.parse::<usize>() {
                Ok(0) => Err("bounded concurrency must be at least 1".to_string()),
                Ok(1) => Ok(Self::Sequential),
                Ok(n) => Ok(Self::Bounded(n)),
                Err(_) => Err(format!(
                    "expected 'sequential', 'concurrent' or a positive integer, got '{s}'"
                )),
            },
        }
    }
}

impl fmt::Display for BatchConcurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Concurrent => write!(f, "concurrent"),
            Self::Bounded(n) => write!(f, "bounded({n})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub batch_size: usize,
    pub concurrency: BatchConcurrency,
    pub generation: GenerationSettings,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.batch_size,
            concurrency: config.batch_concurrency,
            generation: GenerationSettings {
                model: config.gemini_model.clone(),
                temperature: config.temperature,
            },
        }
    }
}

/// Stateless between requests; the generator handle is shared and read-only.
#[derive(Clone)]
pub struct AnalysisPipeline {
    generator: Arc<dyn Generator>,
    settings: PipelineSettings,
}

impl AnalysisPipeline {
    pub fn new(generator: Arc<dyn Generator>, settings: PipelineSettings) -> Self {
        Self {
            generator,
            settings,
        }
    }

    /// Decodes `resultsContent` and runs the pipeline on it.
    pub async fn analyze(&self, content: &Value) -> Result<FinalReport, AnalysisError> {
        let roster = Roster::from_content(content)?;
        self.run(&roster).await
    }

    pub async fn run(&self, roster: &Roster) -> Result<FinalReport, AnalysisError> {
        let batches = batches(&roster.submissions, self.settings.batch_size);
        info!(
            "Scoring {} students in {} batches of up to {} ({}), {} questions",
            roster.submissions.len(),
            batches.len(),
            self.settings.batch_size,
            self.settings.concurrency,
            roster.question_count.get()
        );

        let extractions: Vec<BatchExtraction> = match self.settings.concurrency {
            BatchConcurrency::Sequential => {
                let mut extractions = Vec::with_capacity(batches.len());
                for batch in &batches {
                    extractions.push(self.process_batch(batch, roster).await?);
                }
                extractions
            }
            BatchConcurrency::Concurrent => {
                try_join_all(batches.iter().map(|batch| self.process_batch(batch, roster))).await?
            }
            BatchConcurrency::Bounded(limit) => {
                let pending: Vec<_> = batches
                    .iter()
                    .map(|batch| self.process_batch(batch, roster))
                    .collect();
                stream::iter(pending)
                    .buffered(limit.max(1))
                    .try_collect()
                    .await?
            }
        };

        let report = aggregate(extractions, roster.question_count);
        info!(
            "Aggregated {} records: mean={} max={} min={}",
            report.summary.student_count,
            report.summary.mean_correct,
            report.summary.max_correct,
            report.summary.min_correct
        );
        Ok(report)
    }

    async fn process_batch(
        &self,
        batch: &Batch<'_>,
        roster: &Roster,
    ) -> Result<BatchExtraction, AnalysisError> {
        let request = build_batch_request(
            batch,
            &roster.answer_key,
            roster.question_count,
            &self.settings.generation,
        );

        info!(
            "Submitting batch {} ({} students)",
            batch.index,
            batch.students.len()
        );

        let raw_text = self.generator.generate(&request).await.map_err(|source| {
            warn!("Generation failed for batch {}: {source}", batch.index);
            AnalysisError::Generation {
                batch_index: batch.index,
                source,
            }
        })?;

        info!("Batch {} replied with {} chars", batch.index, raw_text.len());

        let extraction = extract(&BatchResponse {
            batch_index: batch.index,
            raw_text,
        })
        .inspect_err(|e| warn!("Extraction failed: {e}"))?;

        if extraction.records.len() != batch.students.len() {
            warn!(
                "Batch {} returned {} records for {} students",
                batch.index,
                extraction.records.len(),
                batch.students.len()
            );
        }

        Ok(extraction)
    }
}
