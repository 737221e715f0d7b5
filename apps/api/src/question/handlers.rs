//! Axum route handlers for the Question API.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::question::generator::{generate_question, GeneratedQuestion, QuestionParameters};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateQuestionRequest {
    #[serde(alias = "parametros")]
    pub parameters: Option<QuestionParameters>,
}

#[derive(Debug, Serialize)]
pub struct GenerateQuestionResponse {
    pub success: bool,
    pub question: GeneratedQuestion,
    pub error: Option<String>,
}

/// POST /api/generate_question
///
/// Writes one five-alternative exam item grounded with web search.
pub async fn handle_generate_question(
    State(state): State<AppState>,
    payload: Result<Json<GenerateQuestionRequest>, JsonRejection>,
) -> Result<Json<GenerateQuestionResponse>, AppError> {
    let Json(request) = payload?;
    let params = request
        .parameters
        .ok_or_else(|| AppError::Validation("parameters are required".to_string()))?;

    let question =
        generate_question(state.llm.as_ref(), &state.config.gemini_model, &params).await?;

    Ok(Json(GenerateQuestionResponse {
        success: true,
        question,
        error: None,
    }))
}
