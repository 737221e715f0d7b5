pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::analysis::handlers::handle_analyze;
use crate::answer_sheet::handlers::handle_read_image;
use crate::question::handlers::handle_generate_question;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/analyze", post(handle_analyze))
        .route("/api/generate_question", post(handle_generate_question))
        .route("/api/read_image", post(handle_read_image))
        .with_state(state)
}
