use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::state::AppState;

/// Health check
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "activeLimiters": state.limiter.active_actors().await,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
