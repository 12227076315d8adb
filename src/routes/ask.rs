use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::services::qa_service::{self, AskResponse};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(ask))
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

/// POST /api/ask
/// Answer a free-text question about stored prices
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    info!("POST /api/ask - {}", request.question);
    let response = qa_service::answer_question(&state.pool, state.resolver.as_ref(), &request.question).await?;
    Ok(Json(response))
}
