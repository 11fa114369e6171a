//! Dreamlog HTTP server
//!
//! Thin axum surface over `dreamlog-core`: the rate limiter wire endpoint,
//! rate-limited conversation turns, explicit summary refresh and the two
//! interpretation endpoints.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::{Cli, ConfigError, ServerConfig};
pub use error::ApiError;
pub use state::AppState;

/// Requests handled at once before callers queue
const MAX_CONCURRENT_REQUESTS: usize = 64;

/// Build the axum router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(routes::health::health_check))
        // Admission control wire contract
        .route("/rate-limit/{identity}", post(routes::ratelimit::evaluate))
        // Conversations
        .route(
            "/dreams/{dream_id}/blocks/{block_id}/messages",
            post(routes::dreams::post_message).get(routes::dreams::list_messages),
        )
        .route(
            "/dreams/{dream_id}/blocks/{block_id}/summary",
            post(routes::dreams::refresh_summary),
        )
        // Interpretations
        .route(
            "/dreams/{dream_id}/blocks/{block_id}/interpret",
            post(routes::dreams::interpret_block),
        )
        .route("/dreams/{dream_id}/interpret", post(routes::dreams::interpret_dream))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .concurrency_limit(MAX_CONCURRENT_REQUESTS)
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
