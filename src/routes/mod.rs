/// Application routes configuration
use crate::handlers::{get_cache_stats, get_earthquake, health, list_earthquakes, AppState};
use axum::{routing::get, Router};

/// Build the application router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Earthquake endpoints
        .route("/earthquakes", get(list_earthquakes))
        .route("/earthquakes/:id", get(get_earthquake))
        // Cache introspection
        .route("/cache/stats", get(get_cache_stats))
        .with_state(state)
}
