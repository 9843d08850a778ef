//! Health check endpoint

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::state::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    service: &'static str,
    ai_enabled: bool,
    open_sessions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

/// GET /health - Check favorites storage connectivity and report server health
pub async fn check(State(state): State<AppState>) -> impl IntoResponse {
    let (status, health, reason) = match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "healthy", None),
        Err(e) => {
            tracing::error!(error = %e, "Health check storage ping failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", Some(e.to_string()))
        }
    };

    (
        status,
        Json(HealthResponse {
            status: health.to_string(),
            service: "trialscribe",
            ai_enabled: state.extractor.is_some(),
            open_sessions: state.sessions.len(),
            reason,
        }),
    )
}
