use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Capture sessions
        .route("/sessions", post(handlers::start_session))
        .route(
            "/sessions/:session_id",
            get(handlers::get_session_status).delete(handlers::discard_session),
        )
        .route(
            "/sessions/:session_id/chunks",
            post(handlers::append_chunk),
        )
        .route("/sessions/:session_id/stop", post(handlers::stop_session))
        .route("/sessions/:session_id/blob", get(handlers::get_session_blob))
        // Catalog
        .route("/recordings", get(handlers::list_recordings))
        .route("/recordings/*key", axum::routing::delete(handlers::delete_recording))
        // Signed object downloads
        .route("/objects/*key", get(handlers::serve_object))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
