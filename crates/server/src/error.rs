//! Application error handling

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use trialscribe_core::{MatchError, ProfileField};

/// Application error type
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    /// AI features requested without an API key
    Unavailable(String),
    /// A collaborator outside the matching pipeline failed
    Upstream(String),
    Match(MatchError),
}

/// JSON error body
#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<ProfileField>>,
}

impl ErrorBody {
    pub fn new(kind: &'static str, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind,
            missing: None,
        }
    }
}

impl AppError {
    pub(crate) fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorBody::new("not_found", msg)),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorBody::new("invalid_input", msg))
            }
            AppError::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody::new("unavailable", msg),
            ),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, ErrorBody::new("upstream", msg)),
            AppError::Match(err) => {
                let message = err.to_string();
                match err {
                    MatchError::InvalidInput(_) => {
                        (StatusCode::BAD_REQUEST, ErrorBody::new("invalid_input", message))
                    }
                    MatchError::MalformedCustomExpression(_) => (
                        StatusCode::BAD_REQUEST,
                        ErrorBody::new("malformed_custom_expression", message),
                    ),
                    MatchError::ValidationIncomplete { missing } => (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        ErrorBody {
                            missing: Some(missing),
                            ..ErrorBody::new("validation_incomplete", message)
                        },
                    ),
                    MatchError::ExtractionFailure(_) => (
                        StatusCode::BAD_GATEWAY,
                        ErrorBody::new("extraction_failure", message),
                    ),
                    MatchError::UpstreamSearchFailure(_) => (
                        StatusCode::BAD_GATEWAY,
                        ErrorBody::new("upstream_search_failure", message),
                    ),
                    MatchError::Storage(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ErrorBody::new("storage", message),
                    ),
                }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        if status.is_server_error() {
            tracing::error!(status = %status, kind = body.kind, error = %body.error, "Request failed");
        } else {
            tracing::warn!(status = %status, kind = body.kind, error = %body.error, "Request rejected");
        }
        (status, Json(body)).into_response()
    }
}

impl From<MatchError> for AppError {
    fn from(err: MatchError) -> Self {
        AppError::Match(err)
    }
}
