//! Rate Limiting
//!
//! Sliding-window admission control, one actor per identity.
//!
//! - [`state`]: the persisted window and its lifecycle phases
//! - [`request`]: wire request/decision types
//! - [`store`]: persistence seam ([`RateLimitStore`]) and an in-memory store
//! - [`clock`]: wall-clock seam for deterministic tests
//! - [`actor`]: the per-identity evaluation logic and self-scheduled cleanup
//! - [`host`]: the runtime serializing calls per identity and firing alarms
//!
//! Storage failures never block admission. They are logged and the actor
//! answers as if the state were fresh.

pub mod actor;
pub mod clock;
pub mod host;
pub mod request;
pub mod state;
pub mod store;

pub use actor::RateLimiterActor;
pub use clock::{Clock, ManualClock, SystemClock};
pub use host::RateLimiterHost;
pub use request::{RateLimitAction, RateLimitDecision, RateLimitRequest};
pub use state::{RateLimitPhase, RateLimitState};
pub use store::{MemoryRateLimitStore, RateLimitStore};

/// Default maximum admitted requests per window
pub const DEFAULT_MAX_REQUESTS: u32 = 50;

/// Default window length in milliseconds
pub const DEFAULT_WINDOW_MS: u64 = 30_000;

/// How long past `reset_at` a window may linger before it is deleted
pub const STALE_BUFFER_MS: i64 = 5 * 60 * 1000;

/// Offset of the self-scheduled cleanup alarm
pub const ALARM_INTERVAL_MS: i64 = 60 * 1000;

/// Rate limiter configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Used when a request omits `maxRequests`
    pub default_max_requests: u32,
    /// Used when a request omits `windowMs`
    pub default_window_ms: u64,
    pub stale_buffer_ms: i64,
    pub alarm_interval_ms: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_max_requests: DEFAULT_MAX_REQUESTS,
            default_window_ms: DEFAULT_WINDOW_MS,
            stale_buffer_ms: STALE_BUFFER_MS,
            alarm_interval_ms: ALARM_INTERVAL_MS,
        }
    }
}

/// Rate limiter error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// Unparseable or invalid request body
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The actor task for an identity stopped before answering
    #[error("rate limiter actor for '{0}' is unavailable")]
    ActorUnavailable(String),
}
