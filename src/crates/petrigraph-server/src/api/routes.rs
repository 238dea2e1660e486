//! Router assembly.

use axum::routing::{get, post};
use axum::Router;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers;

/// Shared application state. The pipeline itself is stateless; the
/// state only carries process-level facts for /health.
#[derive(Clone)]
pub struct AppState {
    pub started: Instant,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

/// Build the complete API router.
pub fn create_router() -> Router {
    Router::new()
        .route("/build", post(handlers::build))
        .route("/validate", post(handlers::validate))
        .route("/simulate", post(handlers::simulate))
        .route("/dag", post(handlers::dag))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState::default())
}
