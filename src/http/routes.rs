use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Conversation
        .route("/chat/bind", post(handlers::bind_room))
        .route("/chat/history", post(handlers::load_history))
        .route("/chat/messages", get(handlers::get_messages))
        .route("/chat/send", post(handlers::send_message))
        // Capture control
        .route("/capture/arm", post(handlers::arm_capture))
        .route("/capture/start", post(handlers::start_capture))
        .route("/capture/stop", post(handlers::stop_capture))
        .route("/capture/close", post(handlers::close_capture))
        .route("/capture/status", get(handlers::get_capture_status))
        // Recognition results
        .route("/recognition", get(handlers::get_recognition))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
