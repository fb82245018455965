//! Server initialization and routing
//!
//! This module handles the Axum server setup including:
//! - Router configuration with all API endpoints
//! - Middleware stack (auth, logging, compression, etc.)
//! - Graceful shutdown handling
//! - Error handling middleware

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::middleware::{api_key_auth, log_requests, request_id};
use crate::routes::{admin, health, search};
use crate::routes::{api_info, not_found};
use crate::state::ServerState;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use store::KvStore;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the Axum router with all routes and middleware
///
/// Routes are divided into:
/// - Public routes: /, /health, /ready, /metrics (no auth required)
/// - Protected routes: All /api/v1/* endpoints (API key required)
///
/// Middleware stack (applied in reverse order):
/// 1. Request ID tracking
/// 2. Request logging
/// 3. Timeout handling
/// 4. Compression
/// 5. CORS
/// 6. Error handling
/// 7. API key authentication (protected routes only)
fn build_router(state: Arc<ServerState>) -> Router {
    let cors = if state.config.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    let public_routes = Router::new()
        .route("/", get(api_info))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics));

    let protected_routes = Router::new()
        .route("/api/v1/search", post(search::search))
        .layer(DefaultBodyLimit::max(state.config.max_body_size()))
        .route("/api/v1/admin/tags", get(admin::list_tags))
        .route("/api/v1/admin/tags", post(admin::add_tag))
        .route("/api/v1/admin/tags/{tag}", delete(admin::remove_tag))
        .route(
            "/api/v1/admin/tags/{tag}/queue_depth",
            get(admin::queue_depth),
        )
        .route(
            "/api/v1/admin/characters/{name}/count",
            get(admin::character_count),
        )
        .route("/api/v1/metadata", get(health::server_metadata))
        .layer(from_fn_with_state(state.clone(), api_key_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(not_found)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(state.config.timeout_secs),
        ))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(from_fn(request_id))
        .layer(from_fn_with_state(state.clone(), log_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server
///
/// Initializes the server with the provided configuration and KV handle
/// (the same backend the ingestion side writes to) and starts listening
/// for incoming HTTP requests. Blocks until shut down via SIGTERM or
/// Ctrl+C. Tracing initialization here assumes no other component in the
/// process has already installed a global subscriber; callers running
/// this alongside the Discoverer/Fetcher in one process should use
/// `start_server_with_state` and initialize tracing once, themselves.
pub async fn start_server(config: ServerConfig, kv: Arc<dyn KvStore>) -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json()
        .init();

    let state = Arc::new(ServerState::new(config, kv));
    run(state).await
}

/// Start the server from an already-constructed [`ServerState`], without
/// touching global tracing state. Used by the in-process `Supervisor` mode
/// where the binary's entry point owns logging initialization once for
/// every task it spawns.
pub async fn start_server_with_state(state: Arc<ServerState>) -> Result<(), ServerError> {
    run(state).await
}

async fn run(state: Arc<ServerState>) -> Result<(), ServerError> {
    let app = build_router(state.clone());
    let addr: SocketAddr = state.config.socket_addr()?;

    tracing::info!(
        "Starting boorudex server on {} with {} API keys",
        addr,
        state.config.api_keys.len()
    );
    tracing::info!(
        "Timeout: {}s, Max body: {}MB",
        state.config.timeout_secs,
        state.config.max_body_size_mb
    );
    tracing::info!(
        "Rate limit: {} requests/minute",
        state.config.rate_limit_per_minute
    );
    tracing::info!(
        "CORS: {}, Metrics: {}",
        state.config.enable_cors,
        state.config.metrics_enabled
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
