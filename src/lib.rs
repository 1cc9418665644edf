// Library crate for the club statistics server
// This file exposes the public API for integration tests

pub mod config;
pub mod directory;
pub mod results;
pub mod shared;
pub mod stats;

use axum::{http::Method, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

// Re-export commonly used types for easier access in tests
pub use config::Settings;
pub use shared::{AppError, AppState};
pub use stats::{StatsError, StatsService};

/// All statistics routes, traced and readable cross-origin, bound to the given state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(stats::handlers::health))
        .route("/clubs/:club_id/feed", get(stats::handlers::club_feed))
        .route("/clubs/:club_id/summary", get(stats::handlers::club_summary))
        .route("/clubs/:club_id/leaderboard", get(stats::handlers::leaderboard))
        .route("/clubs/:club_id/champions", get(stats::handlers::champions))
        .route("/games/:game_id/feed", get(stats::handlers::game_feed))
        .route("/members/:member_id/history", get(stats::handlers::member_history))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
