//! Axum route handlers for the Answer Sheet API.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::answer_sheet::reader::{read_answer_sheet, ReadSheetRequest};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ReadImageResponse {
    pub success: bool,
    pub answers: Map<String, Value>,
    pub error: Option<String>,
}

/// POST /api/read_image
pub async fn handle_read_image(
    State(state): State<AppState>,
    payload: Result<Json<ReadSheetRequest>, JsonRejection>,
) -> Result<Json<ReadImageResponse>, AppError> {
    let Json(request) = payload?;
    let spec = request.validate()?;

    let answers = read_answer_sheet(state.llm.as_ref(), &state.config.gemini_model, spec).await?;

    Ok(Json(ReadImageResponse {
        success: true,
        answers,
        error: None,
    }))
}
