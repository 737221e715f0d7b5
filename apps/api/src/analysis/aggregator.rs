//! Aggregator: merges per-batch extractions into one report.
//!
//! The model is trusted only for its per-student correct/incorrect
//! classification. Everything derived from it (percentages, question totals,
//! class statistics) is recomputed here.

use serde::Serialize;
use tracing::warn;

use crate::analysis::extractor::{BatchExtraction, StudentRecord};
use crate::analysis::roster::QuestionCount;

/// Whole-class statistics over every aggregated record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSummary {
    pub student_count: usize,
    pub question_count: u32,
    pub total_correct: u64,
    /// Rounded to 2 decimals.
    pub mean_correct: f64,
    pub max_correct: u32,
    pub min_correct: u32,
}

/// The merged result of every batch, in batch order.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalReport {
    pub student_records: Vec<StudentRecord>,
    /// Taken verbatim from batch 0 only.
    pub narrative_text: Option<String>,
    pub summary: ClassSummary,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Merges extractions in ascending batch order, whatever order they arrive in.
pub fn aggregate(mut extractions: Vec<BatchExtraction>, question_count: QuestionCount) -> FinalReport {
    extractions.sort_by_key(|e| e.batch_index);

    let mut narrative_text = None;
    let mut student_records = Vec::new();

    for extraction in extractions {
        if extraction.batch_index == 0 {
            narrative_text = extraction.narrative;
        }
        student_records.extend(
            extraction
                .records
                .into_iter()
                .map(|r| normalize_record(r, question_count)),
        );
    }

    let summary = summarize(&student_records, question_count);

    FinalReport {
        student_records,
        narrative_text,
        summary,
    }
}

/// Overwrites every model-derived figure of a record from `correct_count`
/// and the answer key's question count.
pub fn normalize_record(mut record: StudentRecord, question_count: QuestionCount) -> StudentRecord {
    let total = question_count.get();

    if record.correct_count > total {
        warn!(
            "Record for {:?} claims {} correct answers out of {} questions",
            record.name, record.correct_count, total
        );
    }
    if record.total_questions != total {
        warn!(
            "Record for {:?} stated total_questions={}, overriding with {}",
            record.name, record.total_questions, total
        );
    }

    record.total_questions = total;
    record.percent_correct = round2(f64::from(record.correct_count) / f64::from(total) * 100.0);
    if record.incorrect_count.is_none() {
        record.incorrect_count = Some(total.saturating_sub(record.correct_count));
    }
    record
}

/// Recomputes class statistics from the records. Pure: same records, same summary.
pub fn summarize(records: &[StudentRecord], question_count: QuestionCount) -> ClassSummary {
    let total_correct: u64 = records.iter().map(|r| u64::from(r.correct_count)).sum();
    let mean_correct = if records.is_empty() {
        0.0
    } else {
        round2(total_correct as f64 / records.len() as f64)
    };

    ClassSummary {
        student_count: records.len(),
        question_count: question_count.get(),
        total_correct,
        mean_correct,
        max_correct: records.iter().map(|r| r.correct_count).max().unwrap_or(0),
        min_correct: records.iter().map(|r| r.correct_count).min().unwrap_or(0),
    }
}
