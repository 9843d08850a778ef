//! Favorites handlers

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use trialscribe_core::TrialRecord;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub trial: TrialRecord,
}

#[derive(Serialize)]
pub struct FavoritesResponse {
    favorites: Vec<TrialRecord>,
    count: usize,
}

/// GET /api/favorites - List favorite trials in insertion order
pub async fn list(State(state): State<AppState>) -> impl IntoResponse {
    let favorites = state.favorites.lock().await;
    Json(FavoritesResponse {
        favorites: favorites.list().to_vec(),
        count: favorites.len(),
    })
}

/// GET /api/favorites/{nct_id} - Whether a trial is a favorite
pub async fn contains(
    State(state): State<AppState>,
    Path(nct_id): Path<String>,
) -> impl IntoResponse {
    let favorite = state.favorites.lock().await.contains(&nct_id);
    Json(serde_json::json!({ "nct_id": nct_id, "favorite": favorite }))
}

/// POST /api/favorites/toggle - Add the trial if absent, remove it if present
pub async fn toggle(
    State(state): State<AppState>,
    Json(body): Json<ToggleRequest>,
) -> Result<impl IntoResponse, AppError> {
    if body.trial.nct_id.trim().is_empty() {
        return Err(AppError::BadRequest("Trial nct_id is required".to_string()));
    }
    let nct_id = body.trial.nct_id.clone();

    let mut favorites = state.favorites.lock().await;
    let favorite = favorites.toggle(body.trial).await?;
    tracing::info!(nct_id = %nct_id, favorite, count = favorites.len(), "Favorite toggled");

    Ok(Json(serde_json::json!({
        "nct_id": nct_id,
        "favorite": favorite,
        "count": favorites.len(),
    })))
}
