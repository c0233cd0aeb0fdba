//! Axum router construction for the observer API.
//!
//! Assembles all routes (REST, `WebSocket`, MJPEG) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::stream;
use crate::ws;

/// Build the complete Axum router for the observer server.
///
/// The frame upload route carries its own body limit taken from the
/// configured maximum frame size.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let frame_limit = DefaultBodyLimit::max(state.max_frame_bytes);

    Router::new()
        // Service info
        .route("/", get(handlers::index))
        .route("/api/health", get(handlers::health))
        // State reads
        .route("/api/status", get(handlers::train_status))
        .route("/api/city-status", get(handlers::city_status))
        .route("/api/units", get(handlers::unit_statuses))
        .route("/api/incident", get(handlers::incident_status))
        .route("/api/history", get(handlers::history))
        .route("/api/hierarchy", get(handlers::hierarchy))
        // Incident ingestion
        .route("/api/alert", post(handlers::submit_incident))
        .route("/api/internal/push", post(handlers::submit_incident))
        // Camera feed
        .route(
            "/api/internal/stream/cam1",
            post(stream::ingest_frame).layer(frame_limit),
        )
        .route("/stream/cam1", get(stream::stream_mjpeg))
        // WebSocket
        .route("/ws", get(ws::ws_live))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
