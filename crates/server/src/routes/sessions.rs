//! Refinement session handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trialscribe_core::{PatientProfile, ProfileField, normalize};
use uuid::Uuid;

use super::matching::SearchResponse;
use crate::error::AppError;
use crate::state::AppState;

/// Snapshot of a session without searching
#[derive(Serialize)]
pub struct SessionView {
    session_id: Uuid,
    baseline: PatientProfile,
    working: PatientProfile,
    changed_fields: Vec<ProfileField>,
    is_changed: bool,
    started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_committed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RefineRequest {
    pub profile: Option<PatientProfile>,
}

/// GET /api/sessions/{id} - Show baseline, working copy and changed fields
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.session(id)?;
    let session = session.lock().await;
    Ok(Json(SessionView {
        session_id: id,
        baseline: session.baseline().clone(),
        working: session.working().clone(),
        changed_fields: session.changed_fields(),
        is_changed: session.is_changed(),
        started_at: session.started_at(),
        last_committed_at: session.last_committed_at(),
    }))
}

/// PUT /api/sessions/{id}/profile - Replace the working copy without searching
pub async fn edit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(profile): Json<PatientProfile>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.session(id)?;
    let mut session = session.lock().await;
    session.edit(|working| *working = normalize(&profile));
    tracing::debug!(session_id = %id, changed_fields = ?session.changed_fields(), "Working copy edited");
    Ok(Json(serde_json::json!({
        "session_id": id,
        "working": session.working(),
        "changed_fields": session.changed_fields(),
        "is_changed": session.is_changed(),
    })))
}

/// POST /api/sessions/{id}/refine - Search with the edited profile
pub async fn refine(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<RefineRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.session(id)?;
    let mut session = session.lock().await;
    let outcome = state.pipeline.refine(&mut session, body.profile).await?;
    Ok(Json(SearchResponse::new(id, &session, outcome)))
}

/// POST /api/sessions/{id}/reset - Restore the extracted profile and search again
pub async fn reset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.session(id)?;
    let mut session = session.lock().await;
    let outcome = state.pipeline.reset(&mut session).await?;
    tracing::info!(session_id = %id, "Session reset to baseline");
    Ok(Json(SearchResponse::new(id, &session, outcome)))
}

/// DELETE /api/sessions/{id} - Discard a session
pub async fn discard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if !state.sessions.remove(id) {
        return Err(AppError::NotFound(format!("Session {} not found", id)));
    }
    tracing::info!(session_id = %id, "Session discarded");
    Ok(StatusCode::NO_CONTENT)
}
