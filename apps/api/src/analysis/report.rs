use serde::Serialize;

use crate::analysis::aggregator::{ClassSummary, FinalReport};
use crate::analysis::extractor::StudentRecord;

/// Success body of `POST /api/analyze`. Failures use `errors::FailureBody`.
#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub success: bool,
    pub filename: Option<String>,
    pub student_records: Vec<StudentRecord>,
    pub narrative_text: Option<String>,
    pub summary: ClassSummary,
    pub error: Option<String>,
}

impl AnalysisResponse {
    pub fn assemble(report: FinalReport, filename: Option<String>) -> Self {
        Self {
            success: true,
            filename,
            student_records: report.student_records,
            narrative_text: report.narrative_text,
            summary: report.summary,
            error: None,
        }
    }
}
