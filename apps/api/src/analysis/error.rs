use thiserror::Error;

use crate::llm_client::LlmError;

/// Every way an analysis request can fail. All variants are fatal for the
/// whole request: a failing batch is never skipped or retried.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The uploaded roster cannot be scored (empty, key only, no questions...).
    #[error("invalid results file: {0}")]
    InputValidation(String),

    /// The remote model call for a batch failed (transport, auth, quota).
    #[error("generation failed for batch {batch_index}: {source}")]
    Generation {
        batch_index: usize,
        #[source]
        source: LlmError,
    },

    /// The reply had no usable ```json block, or the block did not parse.
    #[error("malformed model reply for batch {batch_index}: {reason}. Reply excerpt: {excerpt}")]
    MalformedExtraction {
        batch_index: usize,
        reason: String,
        excerpt: String,
    },

    /// The block parsed but held no records.
    #[error("model returned no student records for batch {batch_index}. Reply excerpt: {excerpt}")]
    EmptyBatchResult { batch_index: usize, excerpt: String },
}

impl AnalysisError {
    /// True when the fault lies in the uploaded data rather than the model.
    pub fn is_input_error(&self) -> bool {
        matches!(self, AnalysisError::InputValidation(_))
    }

    /// Index of the batch that failed, if the failure is batch-scoped.
    pub fn batch_index(&self) -> Option<usize> {
        match self {
            AnalysisError::InputValidation(_) => None,
            AnalysisError::Generation { batch_index, .. }
            | AnalysisError::MalformedExtraction { batch_index, .. }
            | AnalysisError::EmptyBatchResult { batch_index, .. } => Some(*batch_index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_error_names_batch() {
        let err = AnalysisError::Generation {
            batch_index: 3,
            source: LlmError::Api {
                status: 429,
                message: "quota exceeded".to_string(),
            },
        };
        let message = err.to_string();
        assert!(message.contains("batch 3"), "{message}");
        assert!(message.contains("quota exceeded"), "{message}");
        assert_eq!(err.batch_index(), Some(3));
        assert!(!err.is_input_error());
    }

    #[test]
    fn test_input_error_has_no_batch() {
        let err = AnalysisError::InputValidation("empty roster".to_string());
        assert!(err.is_input_error());
        assert_eq!(err.batch_index(), None);
    }
}
