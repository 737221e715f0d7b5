//! Axum route handlers for the Analysis API.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::analysis::report::AnalysisResponse;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    /// JSON-encoded array: answer key first, then one row per student.
    #[serde(alias = "resultadosContent")]
    pub results_content: Value,
    /// Advisory; only echoed back and logged.
    #[serde(default, alias = "resultadosFilename")]
    pub results_filename: Option<String>,
}

/// POST /api/analyze
///
/// Corrects the uploaded roster in batches and returns per-student records,
/// recomputed class statistics and the class narrative.
pub async fn handle_analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalysisResponse>, AppError> {
    let Json(request) = payload?;

    if request.results_content.is_null() {
        return Err(AppError::Validation(
            "resultsContent is required".to_string(),
        ));
    }

    let span = info_span!("analyze", request_id = %Uuid::new_v4());
    async move {
        info!(
            "Analysing results file {:?}",
            request.results_filename.as_deref().unwrap_or("<unnamed>")
        );

        let report = state
            .pipeline
            .analyze(&request.results_content)
            .await
            .inspect_err(|e| {
                if let Some(batch_index) = e.batch_index() {
                    warn!(batch_index, "Analysis aborted by a failing batch");
                }
            })?;

        Ok::<_, AppError>(Json(AnalysisResponse::assemble(
            report,
            request.results_filename,
        )))
    }
    .instrument(span)
    .await
}
