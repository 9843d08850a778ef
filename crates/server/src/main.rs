//! trialscribe-server: clinical trial matching HTTP server binary entrypoint.

use std::net::SocketAddr;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trialscribe_server::config::Config;
use trialscribe_server::state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = Config::from_env();

    if config.anthropic_api_key.is_some() {
        tracing::info!("Anthropic API key configured, extraction and trial chat enabled");
    } else {
        tracing::warn!("ANTHROPIC_API_KEY not set, extraction and trial chat disabled");
    }
    if config.database_url.is_some() {
        tracing::info!("Favorites persisted to PostgreSQL");
    } else {
        tracing::warn!("DATABASE_URL not set, favorites kept in memory");
    }
    tracing::info!(
        registry = %config.registry_base_url,
        upper_bound = config.filter_upper_bound,
        narrowing = ?config.filter_narrowing,
        "Trial registry configured"
    );
    tracing::info!("Rate limiting: {} requests/second", config.rate_limit_rps);

    let state = match AppState::from_config(&config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize application state");
            return ExitCode::FAILURE;
        }
    };

    let app = trialscribe_server::build_app(state, &config);

    let addr: SocketAddr = match config.bind_address.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(address = %config.bind_address, error = %e, "Invalid bind address");
            return ExitCode::FAILURE;
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("Starting TrialScribe server on {}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    tracing::info!("Server shutdown complete");
    ExitCode::SUCCESS
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
