//! Audit logging middleware for mutations

use axum::{body::Body, extract::Request, http::Method, middleware::Next, response::Response};

use super::metrics::normalize_path;
use super::request_id::RequestId;

/// Log session and favorites mutations (POST, PUT, DELETE)
pub async fn audit_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|r| r.0.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let response = next.run(request).await;

    if matches!(method, Method::POST | Method::PUT | Method::DELETE) {
        tracing::info!(
            target: "audit",
            request_id = %request_id,
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            "Mutation request"
        );
    }

    response
}
