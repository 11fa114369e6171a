//! Rate limiter wire endpoint

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use dreamlog_core::{RateLimitDecision, RateLimitRequest};

use crate::error::ApiError;
use crate::state::AppState;

/// `POST /rate-limit/{identity}` with `{action, maxRequests?, windowMs?}`.
///
/// A denial is still a 200 here; the caller reads `allowed`.
pub async fn evaluate(
    State(state): State<AppState>,
    Path(identity): Path<String>,
    body: Bytes,
) -> Result<Json<RateLimitDecision>, ApiError> {
    let request = RateLimitRequest::from_json(&body)?;
    let decision = state.limiter.evaluate(&identity, request).await?;
    Ok(Json(decision))
}
