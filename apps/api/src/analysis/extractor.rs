//! Response extractor: turns one batch's raw reply into student records and,
//! for batch 0, the narrative that follows the JSON block.
//!
//! Stages: locate the ```json fence → narrow to the outermost `[`…`]` →
//! strict parse → per-record validation. Any stage failing is fatal for the
//! batch. Whitespace and fence placement drift is tolerated; a missing or
//! unparsable payload is not.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::analysis::error::AnalysisError;
use crate::llm_client::fenced::{excerpt, locate_json_fence, narrow_to_delimiters};

/// Maximum characters of a reply quoted in an error message.
const EXCERPT_CHARS: usize = 300;

/// The unparsed reply for one batch.
#[derive(Debug, Clone)]
pub struct BatchResponse {
    pub batch_index: usize,
    pub raw_text: String,
}

/// One student's scored result.
///
/// `total_questions` and `percent_correct` carry whatever the model stated
/// until aggregation overwrites them from the answer key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRecord {
    pub name: String,
    pub total_questions: u32,
    pub correct_count: u32,
    /// Model-classified; derived from the question count when the model omitted it.
    pub incorrect_count: Option<u32>,
    pub percent_correct: f64,
}

/// Extraction result for one batch.
#[derive(Debug, Clone)]
pub struct BatchExtraction {
    pub batch_index: usize,
    pub records: Vec<StudentRecord>,
    pub narrative: Option<String>,
}

/// Record as the model writes it. Accepts the requested English keys and the
/// legacy Portuguese ones; values stay loose until `into_record`.
#[derive(Debug, Deserialize)]
struct ModelRecord {
    #[serde(alias = "Aluno", alias = "aluno", alias = "Nome", alias = "student")]
    name: Option<Value>,
    #[serde(alias = "Acertos", alias = "acertos", alias = "correct")]
    correct_count: Option<Value>,
    #[serde(alias = "Erros", alias = "erros", alias = "incorrect")]
    incorrect_count: Option<Value>,
    #[serde(alias = "Percentual_Acerto", alias = "percentual_acerto")]
    percent_correct: Option<Value>,
    #[serde(alias = "Total_Questoes", alias = "total_questoes")]
    total_questions: Option<Value>,
}

impl ModelRecord {
    fn into_record(self, position: usize) -> Result<StudentRecord, String> {
        let name = match self.name {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(format!("record {position} has no student name")),
        };

        let correct_count = self
            .correct_count
            .as_ref()
            .and_then(lenient_count)
            .ok_or_else(|| format!("record {position} ({name}) has no usable correct_count"))?;

        Ok(StudentRecord {
            name,
            correct_count,
            incorrect_count: self.incorrect_count.as_ref().and_then(lenient_count),
            total_questions: self
                .total_questions
                .as_ref()
                .and_then(lenient_count)
                .unwrap_or(0),
            percent_correct: self
                .percent_correct
                .as_ref()
                .and_then(lenient_number)
                .unwrap_or(0.0),
        })
    }
}

/// Reads a number that the model may have written as a string, with a
/// decimal comma or a trailing percent sign.
fn lenient_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

/// A non-negative whole number, leniently read.
fn lenient_count(value: &Value) -> Option<u32> {
    let n = lenient_number(value)?;
    if n < 0.0 || n.fract() != 0.0 || n > f64::from(u32::MAX) {
        return None;
    }
    Some(n as u32)
}

/// Extracts the records (and, for batch 0, the narrative) from one reply.
pub fn extract(response: &BatchResponse) -> Result<BatchExtraction, AnalysisError> {
    let batch_index = response.batch_index;
    let text = response.raw_text.as_str();
    let malformed = |reason: String| AnalysisError::MalformedExtraction {
        batch_index,
        reason,
        excerpt: excerpt(text, EXCERPT_CHARS),
    };

    let block = locate_json_fence(text)
        .ok_or_else(|| malformed("the reply has no ```json block".to_string()))?;
    if !block.closed {
        warn!("Batch {batch_index}: ```json block is not closed, reply may be truncated");
    }

    let payload = narrow_to_delimiters(block.body, '[', ']')
        .ok_or_else(|| malformed("the ```json block holds no [ ... ] array".to_string()))?;

    let raw_records: Vec<ModelRecord> = serde_json::from_str(payload)
        .map_err(|e| malformed(format!("the JSON array does not parse: {e}")))?;

    if raw_records.is_empty() {
        return Err(AnalysisError::EmptyBatchResult {
            batch_index,
            excerpt: excerpt(text, EXCERPT_CHARS),
        });
    }

    let records = raw_records
        .into_iter()
        .enumerate()
        .map(|(i, r)| r.into_record(i))
        .collect::<Result<Vec<_>, _>>()
        .map_err(malformed)?;

    let narrative = if batch_index == 0 {
        Some(text[block.end..].trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    } else {
        None
    };

    Ok(BatchExtraction {
        batch_index,
        records,
        narrative,
    })
}
