//! Sublog HTTP API
//!
//! HTTP layer for Sublog, built with Axum.
//!
//! # Endpoints
//!
//! ## Logs
//! - `POST /logs` - Ingest one event or an array of events
//! - `GET /logs/recent?limit=N` - Most recent records (default 100, max 1000)
//! - `GET /logs/count` - Total stored records
//! - `DELETE /logs/all` - Erase all records and notify live viewers
//!
//! ## Live stream
//! - `GET /ws` - WebSocket pushing every new record
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! Any other path is served from the frontend directory, with `index.html`
//! as the fallback document.
//!
//! # Example
//!
//! ```rust,ignore
//! use sublog::api::{serve, AppState};
//! use sublog::config::ServerConfig;
//! use sublog::storage::LogStore;
//! use sublog::websocket::{Hub, HubConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(LogStore::open("./data/sublog.db")?);
//!     let (hub, _hub_task) = Hub::spawn(HubConfig::default());
//!     let config = ServerConfig::default();
//!
//!     serve(AppState::new(store, hub, config.clone()), &config).await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::websocket::websocket_handler;

/// Build the router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let frontend_dir = state.config.frontend_dir.clone();
    let max_body_size = state.config.max_body_size;
    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let static_files =
        ServeDir::new(&frontend_dir).fallback(ServeFile::new(frontend_dir.join("index.html")));

    let shared_state = Arc::new(state);

    Router::new()
        .route("/logs", post(routes::logs::ingest_logs))
        .route("/logs/recent", get(routes::logs::recent_logs))
        .route("/logs/count", get(routes::logs::log_count))
        .route("/logs/all", delete(routes::logs::clear_logs))
        .route("/ws", get(websocket_handler))
        .nest("/health", health_routes)
        .fallback_service(static_files)
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the HTTP server and run until a shutdown signal arrives
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<(), ApiError> {
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(listener, state, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve_on<F>(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: F,
) -> Result<(), ApiError>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    if !state.config.frontend_dir.is_dir() {
        tracing::warn!(
            frontend_dir = ?state.config.frontend_dir,
            "Frontend directory not found, static assets will 404"
        );
    } else {
        tracing::info!("Serving static files from {:?}", state.config.frontend_dir);
    }

    let router = build_router(state);
    let local_addr = listener.local_addr()?;
    tracing::info!("Sublog listening on {}", local_addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Sublog shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
