//! Transcript-to-trials matching handler

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use trialscribe_core::{
    NarrowingStep, PatientProfile, ProfileField, RefinementSession, SearchOutcome,
    TrialRecord,
};
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::middleware::record_search;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub transcript: String,
    /// Session being replaced by this transcript; discarded once extraction succeeds
    #[serde(default)]
    pub previous_session_id: Option<Uuid>,
}

/// Search results together with the session they were produced for
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub session_id: Uuid,
    pub trials: Vec<TrialRecord>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u32>,
    pub rounds_used: u32,
    pub upstream_calls: u32,
    pub truncated: bool,
    pub narrowing_applied: Vec<NarrowingStep>,
    pub profile: PatientProfile,
    pub changed_fields: Vec<ProfileField>,
    pub is_changed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_recommended: Vec<ProfileField>,
}

impl SearchResponse {
    pub fn new(session_id: Uuid, session: &RefinementSession, outcome: SearchOutcome) -> Self {
        record_search(&outcome);
        Self {
            session_id,
            count: outcome.trials.len(),
            trials: outcome.trials,
            total_count: outcome.total_count,
            rounds_used: outcome.rounds_used,
            upstream_calls: outcome.upstream_calls,
            truncated: outcome.truncated,
            narrowing_applied: outcome.narrowing_applied,
            profile: session.working().clone(),
            changed_fields: session.changed_fields(),
            is_changed: session.is_changed(),
            missing_recommended: Vec::new(),
        }
    }
}

/// Body returned when the extracted profile could not be searched
///
/// The session is kept so the caller can fix the profile and refine without
/// extracting again.
#[derive(Serialize)]
struct OpenSessionError {
    session_id: Uuid,
    profile: PatientProfile,
    #[serde(flatten)]
    error: ErrorBody,
    missing_recommended: Vec<ProfileField>,
}

/// POST /api/extract-and-match - Extract a profile from a transcript and search for trials
///
/// Starting over replaces the session named by `previous_session_id`. When the
/// first search fails (missing required information, registry errors) the new
/// session is still opened and its id returned alongside the error.
pub async fn extract_and_match(
    State(state): State<AppState>,
    Json(body): Json<ExtractRequest>,
) -> Result<Response, AppError> {
    let extractor = state
        .extractor
        .clone()
        .ok_or_else(|| AppError::Unavailable("ANTHROPIC_API_KEY not configured".to_string()))?;

    let (session, report) = state
        .pipeline
        .start_session(extractor.as_ref(), &body.transcript)
        .await?;

    if let Some(previous) = body.previous_session_id {
        if state.sessions.remove(previous) {
            tracing::info!(session_id = %previous, "Previous session discarded");
        }
    }

    let result = state
        .pipeline
        .search(&session)
        .await
        .map(|outcome| SearchResponse::new(Uuid::nil(), &session, outcome));
    let profile = session.working().clone();
    let session_id = state.sessions.insert(session);

    match result {
        Ok(mut response) => {
            response.session_id = session_id;
            response.missing_recommended = report.missing_recommended;
            tracing::info!(session_id = %session_id, trials = response.count, "Session opened");
            Ok(Json(response).into_response())
        }
        Err(e) => {
            let (status, error) = AppError::from(e).status_and_body();
            tracing::warn!(
                session_id = %session_id,
                status = %status,
                kind = error.kind,
                error = %error.error,
                "Session opened but the initial search failed"
            );
            let body = OpenSessionError {
                session_id,
                profile,
                error,
                missing_recommended: report.missing_recommended,
            };
            Ok((status, Json(body)).into_response())
        }
    }
}
