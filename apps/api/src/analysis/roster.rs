//! Decoding of the uploaded results roster.
//!
//! Row 0 is the official answer key, every following row is one student's
//! marked answers. Rows are kept as JSON objects in upload order; the first
//! column is the student-name field, every other column is a question.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::analysis::error::AnalysisError;

/// One roster row, keyed by column header in upload order.
pub type RosterRow = Map<String, Value>;

/// Row 0 of the roster: question identifier to correct label.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AnswerKey(RosterRow);

impl AnswerKey {
    pub fn fields(&self) -> &RosterRow {
        &self.0
    }

    /// Column holding the student name (the first header).
    pub fn name_field(&self) -> Option<&str> {
        self.0.keys().next().map(String::as_str)
    }
}

/// One student's marked answers plus their name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StudentSubmission(RosterRow);

impl StudentSubmission {
    pub fn fields(&self) -> &RosterRow {
        &self.0
    }
}

/// Number of scored questions: answer-key columns minus the name column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QuestionCount(u32);

impl QuestionCount {
    pub fn get(self) -> u32 {
        self.0
    }
}

/// The decoded, validated upload. Immutable for the pipeline's lifetime.
#[derive(Debug, Clone)]
pub struct Roster {
    pub answer_key: AnswerKey,
    pub submissions: Vec<StudentSubmission>,
    pub question_count: QuestionCount,
}

impl Roster {
    /// Decodes `resultsContent`, which is normally a JSON-encoded string but
    /// is also accepted as an already-decoded array.
    pub fn from_content(content: &Value) -> Result<Self, AnalysisError> {
        let rows = match content {
            Value::String(encoded) => {
                let decoded: Value = serde_json::from_str(encoded).map_err(|e| {
                    AnalysisError::InputValidation(format!("results content is not valid JSON: {e}"))
                })?;
                into_rows(decoded)?
            }
            other => into_rows(other.clone())?,
        };
        Self::from_rows(rows)
    }

    pub fn from_rows(rows: Vec<RosterRow>) -> Result<Self, AnalysisError> {
        let mut rows = rows.into_iter();

        let answer_key = rows.next().ok_or_else(|| {
            AnalysisError::InputValidation(
                "the results file contains no data after conversion".to_string(),
            )
        })?;

        if answer_key.is_empty() {
            return Err(AnalysisError::InputValidation(
                "the answer key (first row) is empty".to_string(),
            ));
        }

        let question_count = u32::try_from(answer_key.len() - 1).map_err(|_| {
            AnalysisError::InputValidation("the answer key has too many columns".to_string())
        })?;
        if question_count == 0 {
            return Err(AnalysisError::InputValidation(
                "the answer key has no question columns besides the name column".to_string(),
            ));
        }

        let submissions: Vec<StudentSubmission> = rows.map(StudentSubmission).collect();
        if submissions.is_empty() {
            return Err(AnalysisError::InputValidation(
                "the results file contains no student markings to correct".to_string(),
            ));
        }

        Ok(Self {
            answer_key: AnswerKey(answer_key),
            submissions,
            question_count: QuestionCount(question_count),
        })
    }
}

fn into_rows(decoded: Value) -> Result<Vec<RosterRow>, AnalysisError> {
    let Value::Array(items) = decoded else {
        return Err(AnalysisError::InputValidation(
            "results content must be a JSON array of rows".to_string(),
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(row) => Ok(row),
            other => Err(AnalysisError::InputValidation(format!(
                "row {i} is not an object (found {})",
                json_kind(&other)
            ))),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
