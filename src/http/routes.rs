use super::handlers;
use super::state::AppState;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Streaming endpoint (with and without the trailing slash)
        .route("/ws", get(handlers::stream_socket))
        .route("/ws/", get(handlers::stream_socket))
        // Active recordings
        .route("/streams", get(handlers::list_streams))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
