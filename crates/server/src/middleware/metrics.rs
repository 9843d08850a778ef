//! Prometheus metrics collection
//!
//! Records `http_requests_total` (counter) and `http_request_duration_seconds`
//! (histogram) for every request, with method/path/status labels, plus
//! counters describing each trial search.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use trialscribe_core::SearchOutcome;

fn is_nct_id(seg: &str) -> bool {
    seg.len() == 11
        && seg.get(..3).is_some_and(|prefix| prefix.eq_ignore_ascii_case("nct"))
        && seg.bytes().skip(3).all(|b| b.is_ascii_digit())
}

/// Normalize request paths to avoid high-cardinality labels.
/// Session ids and NCT ids are replaced with `:id`.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|seg| {
            if uuid::Uuid::try_parse(seg).is_ok() || is_nct_id(seg) {
                ":id"
            } else {
                seg
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Middleware that records request count and duration metrics.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    let start = Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed().as_secs_f64();

    let status = response.status().as_u16().to_string();

    metrics::counter!(
        "http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(duration);

    response
}

/// Count one completed trial search.
pub fn record_search(outcome: &SearchOutcome) {
    metrics::counter!("trial_search_total", "rounds" => outcome.rounds_used.to_string())
        .increment(1);
    metrics::counter!("trial_search_upstream_calls_total")
        .increment(u64::from(outcome.upstream_calls));
    if outcome.truncated {
        metrics::counter!("trial_search_truncated_total").increment(1);
    }
}
