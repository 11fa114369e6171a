//! Wire contract of the rate limiter.
//!
//! Request: `{action: "hit"|"reset"|"get", maxRequests?, windowMs?}`
//! Response: `{allowed, count, remaining, resetAt}`

use serde::{Deserialize, Serialize};

use super::RateLimitError;

/// What an evaluation does to the window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitAction {
    /// Count one unit of work
    Hit,
    /// Start a new, empty window
    Reset,
    /// Read only
    Get,
}

/// Evaluation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRequest {
    pub action: RateLimitAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_requests: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_ms: Option<u64>,
}

impl RateLimitRequest {
    pub fn new(action: RateLimitAction) -> Self {
        Self {
            action,
            max_requests: None,
            window_ms: None,
        }
    }

    pub fn hit() -> Self {
        Self::new(RateLimitAction::Hit)
    }

    pub fn get() -> Self {
        Self::new(RateLimitAction::Get)
    }

    pub fn reset() -> Self {
        Self::new(RateLimitAction::Reset)
    }

    pub fn with_limits(mut self, max_requests: u32, window_ms: u64) -> Self {
        self.max_requests = Some(max_requests);
        self.window_ms = Some(window_ms);
        self
    }

    /// Parse and validate a raw request body
    pub fn from_json(body: &[u8]) -> Result<Self, RateLimitError> {
        let request: Self = serde_json::from_slice(body)
            .map_err(|e| RateLimitError::BadRequest(e.to_string()))?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), RateLimitError> {
        if self.window_ms == Some(0) {
            return Err(RateLimitError::BadRequest(
                "windowMs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Allow/deny decision returned for every well-formed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub count: u32,
    pub remaining: u32,
    /// Epoch milliseconds at which the window ends
    pub reset_at: i64,
}

impl RateLimitDecision {
    pub fn compute(count: u32, max_requests: u32, reset_at: i64) -> Self {
        Self {
            allowed: count <= max_requests,
            count,
            remaining: max_requests.saturating_sub(count),
            reset_at,
        }
    }
}
