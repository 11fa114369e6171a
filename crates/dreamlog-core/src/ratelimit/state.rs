//! Persisted rate limit window and its lifecycle.

use serde::{Deserialize, Serialize};

/// Window state of one identity. Owned by that identity's actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitState {
    pub key: String,
    pub count: u32,
    /// Epoch milliseconds at which the window ends
    pub reset_at: i64,
}

impl RateLimitState {
    /// A new, empty window starting at `now`
    pub fn fresh(key: &str, now: i64, window_ms: u64) -> Self {
        Self {
            key: key.to_string(),
            count: 0,
            reset_at: now.saturating_add(window_ms.min(i64::MAX as u64) as i64),
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now > self.reset_at
    }

    /// Far enough past the window that the record should be deleted
    pub fn is_stale(&self, now: i64, stale_buffer_ms: i64) -> bool {
        self.reset_at > 0 && now > self.reset_at.saturating_add(stale_buffer_ms)
    }
}

/// Lifecycle phase of an identity's window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitPhase {
    /// No record
    Fresh,
    /// Window in progress
    Active,
    /// Window elapsed, reset pending
    Expired,
    /// Far past the window, eligible for deletion
    Stale,
}

impl RateLimitPhase {
    pub fn of(state: Option<&RateLimitState>, now: i64, stale_buffer_ms: i64) -> Self {
        match state {
            None => RateLimitPhase::Fresh,
            Some(s) if s.is_stale(now, stale_buffer_ms) => RateLimitPhase::Stale,
            Some(s) if s.is_expired(now) => RateLimitPhase::Expired,
            Some(_) => RateLimitPhase::Active,
        }
    }
}
