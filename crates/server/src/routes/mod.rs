pub mod chat;
pub mod favorites;
pub mod health;
pub mod matching;
pub mod metrics;
pub mod sessions;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

/// Build the matching API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/extract-and-match", post(matching::extract_and_match))
        .route(
            "/sessions/{id}",
            get(sessions::show).delete(sessions::discard),
        )
        .route("/sessions/{id}/profile", put(sessions::edit))
        .route("/sessions/{id}/refine", post(sessions::refine))
        .route("/sessions/{id}/reset", post(sessions::reset))
        .route("/favorites", get(favorites::list))
        .route("/favorites/toggle", post(favorites::toggle))
        .route("/favorites/{nct_id}", get(favorites::contains))
        .route("/trials/chat", post(chat::ask))
}
