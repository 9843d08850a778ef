//! trialscribe-server library crate
//!
//! Exposes `build_app`, `config` and `state` for integration tests.
//! The actual binary entrypoint is in `main.rs`.

pub mod ai;
pub mod config;
pub mod db;
pub mod error;
mod middleware;
pub mod registry;
mod routes;
pub mod state;

use axum::{Extension, Router, middleware as axum_mw, routing::get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use state::AppState;

/// Build the full application router with all routes and middleware.
///
/// Extracted from `main()` so integration tests can construct the app
/// without binding to a TCP port.
pub fn build_app(state: AppState, config: &Config) -> Router {
    let rate_limiter = middleware::create_rate_limiter(config.rate_limit_rps);

    let api_routes = Router::new()
        .nest("/api", routes::api_routes())
        .layer(axum_mw::from_fn(middleware::rate_limit_middleware))
        .layer(Extension(rate_limiter));

    // Install Prometheus metrics recorder.
    // build_recorder() + set_global_recorder() so repeated calls (integration
    // tests) keep working; only the first install takes effect.
    let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
    let prometheus_handle = recorder.handle();
    let _ = metrics::set_global_recorder(recorder);

    let public_routes = Router::new()
        .route("/health", get(routes::health::check))
        .route("/metrics", get(routes::metrics::get))
        .layer(Extension(prometheus_handle));

    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .with_state(state)
        .layer(axum_mw::from_fn(middleware::audit_middleware))
        .layer(axum_mw::from_fn(middleware::request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum_mw::from_fn(middleware::metrics_middleware))
}
