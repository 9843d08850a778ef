//! Per-trial chat handler

use axum::{Json, extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use trialscribe_core::TrialRecord;

use crate::ai::{Message, chatbot};
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub trial: TrialRecord,
    pub question: String,
    #[serde(default)]
    pub history: Vec<Message>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    answer: String,
}

/// POST /api/trials/chat - Answer a question about one trial
pub async fn ask(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    let client = state
        .claude
        .as_ref()
        .ok_or_else(|| AppError::Unavailable("ANTHROPIC_API_KEY not configured".to_string()))?;

    let question = body.question.trim();
    if question.is_empty() {
        return Err(AppError::BadRequest("Question is required".to_string()));
    }

    tracing::info!(nct_id = %body.trial.nct_id, "Trial chat request");

    let answer = chatbot::ask(client, &body.trial, &body.history, question)
        .await
        .map_err(|e| AppError::Upstream(format!("Chat failed: {}", e)))?;

    Ok(Json(ChatResponse { answer }))
}
