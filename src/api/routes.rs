//! Router setup with all API routes and middleware.

use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::handlers;
use crate::api::state::AppState;
use crate::{ChronosError, Result};

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(handlers::chat))
        .route("/health", get(handlers::health))
        .route("/logs", get(handlers::logs))
        .route(
            "/conversations/{user_id}/{session_id}",
            get(handlers::conversation),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn start_server(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ChronosError::ApiError(format!("Failed to bind {}: {}", addr, e)))?;

    info!("Chronos API listening on http://{}", addr);

    axum::serve(listener, create_router(state))
        .await
        .map_err(|e| ChronosError::ApiError(format!("Server error: {}", e)))
}
