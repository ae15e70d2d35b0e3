use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Call lifecycle
        .route("/calls", post(handlers::start_call))
        .route(
            "/calls/:session_id",
            get(handlers::get_call).delete(handlers::delete_call),
        )
        .route("/calls/:session_id/end", post(handlers::end_call))
        .route("/calls/:session_id/restart", post(handlers::restart_call))
        // Transcript and analysis
        .route(
            "/calls/:session_id/transcript",
            get(handlers::get_transcript).post(handlers::post_message),
        )
        .route("/calls/:session_id/analysis", get(handlers::get_analysis))
        // Speech client events
        .route(
            "/calls/:session_id/speech/interim",
            post(handlers::speech_interim),
        )
        .route("/calls/:session_id/speech/final", post(handlers::speech_final))
        .route("/calls/:session_id/speech/error", post(handlers::speech_error))
        .route("/calls/:session_id/speech/end", post(handlers::speech_end))
        .route(
            "/calls/:session_id/speech/spoken",
            post(handlers::speech_spoken),
        )
        .route(
            "/calls/:session_id/speech/commands",
            get(handlers::speech_commands),
        )
        // Request logging, then CORS for browser speech clients
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
