//! Dream conversation endpoints

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use dreamlog_core::{ConversationKey, RateLimitRequest};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::IDENTITY_HEADER;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnPayload {
    pub content: String,
    pub block_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPayload {
    pub block_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DreamPayload {
    pub dream_text: String,
}

fn identity(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(IDENTITY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest(format!("missing {IDENTITY_HEADER} header")))
}

/// Post a message and get the guide's reply
pub async fn post_message(
    State(state): State<AppState>,
    Path((dream_id, block_id)): Path<(String, String)>,
    headers: HeaderMap,
    payload: Result<Json<TurnPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let user = identity(&headers)?;
    let Json(payload) = payload?;

    let decision = state.limiter.evaluate(&user, RateLimitRequest::hit()).await?;
    if !decision.allowed {
        debug!(identity = %user, count = decision.count, "Conversation turn rate limited");
        return Err(ApiError::RateLimited(decision));
    }

    let key = ConversationKey::new(dream_id, block_id);
    let turn = state
        .conversations
        .respond(&key, &payload.block_text, &payload.content)
        .await?;

    let mut response = Json(turn.view()).into_response();
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(decision.reset_at));
    Ok(response)
}

/// Message log of a block, oldest first
pub async fn list_messages(
    State(state): State<AppState>,
    Path((dream_id, block_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let key = ConversationKey::new(dream_id, block_id);
    let messages = state.storage.list_messages(&key)?;

    Ok(Json(json!({
        "total": messages.len(),
        "messages": messages,
    })))
}

/// Force a summary refresh of a block
pub async fn refresh_summary(
    State(state): State<AppState>,
    Path((dream_id, block_id)): Path<(String, String)>,
    payload: Result<Json<BlockPayload>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(payload) = payload?;
    let key = ConversationKey::new(dream_id, block_id);
    let outcome = state.summaries.refresh(&key, &payload.block_text).await?;

    Ok(Json(json!({
        "status": outcome.status(),
        "summary": outcome.summary_text(),
        "lastProcessedCount": outcome.last_processed_count(),
    })))
}

/// Final interpretation of one block
pub async fn interpret_block(
    State(state): State<AppState>,
    Path((dream_id, block_id)): Path<(String, String)>,
    payload: Result<Json<BlockPayload>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(payload) = payload?;
    let key = ConversationKey::new(dream_id, block_id);
    let interpretation = state
        .interpreter
        .interpret_block_from_store(&state.storage, &key, &payload.block_text)
        .await?;

    Ok(Json(json!({ "interpretation": interpretation })))
}

/// Final interpretation of a whole dream
pub async fn interpret_dream(
    State(state): State<AppState>,
    Path(dream_id): Path<String>,
    payload: Result<Json<DreamPayload>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(payload) = payload?;
    let interpretation = state
        .interpreter
        .interpret_dream_from_store(&state.storage, &dream_id, &payload.dream_text)
        .await?;

    Ok(Json(json!({ "interpretation": interpretation })))
}
