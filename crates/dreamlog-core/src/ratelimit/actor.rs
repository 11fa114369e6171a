//! Per-identity rate limiter actor.
//!
//! One `RateLimiterActor` exists per identity and is the only writer of that
//! identity's [`RateLimitState`]. It takes `&mut self` everywhere: the host
//! runtime guarantees that requests and alarms for one identity never overlap.
//!
//! Every evaluation (re)arms a cleanup alarm `alarm_interval_ms` ahead. The
//! alarm deletes stale windows and always re-arms itself, so identities that
//! stop sending traffic are still reclaimed.

use std::sync::Arc;

use tracing::{debug, warn};

use super::clock::Clock;
use super::request::{RateLimitAction, RateLimitDecision, RateLimitRequest};
use super::state::{RateLimitPhase, RateLimitState};
use super::store::RateLimitStore;
use super::RateLimitConfig;

pub struct RateLimiterActor {
    key: String,
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    config: RateLimitConfig,
    next_alarm: Option<i64>,
}

impl RateLimiterActor {
    pub fn new(
        key: impl Into<String>,
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
        config: RateLimitConfig,
    ) -> Self {
        Self {
            key: key.into(),
            store,
            clock,
            config,
            next_alarm: None,
        }
    }

    /// Resume an actor whose alarm was armed before a restart
    pub fn with_pending_alarm(mut self, fire_at: i64) -> Self {
        self.next_alarm = Some(fire_at);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Epoch milliseconds of the armed alarm, if any
    pub fn next_alarm(&self) -> Option<i64> {
        self.next_alarm
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Evaluate one request against the identity's window.
    ///
    /// Always answers. Storage faults are logged and treated as a fresh
    /// window so admission degrades toward allowing traffic.
    pub fn evaluate(&mut self, request: &RateLimitRequest) -> RateLimitDecision {
        let now = self.clock.now_ms();
        self.arm_alarm(now);

        let max_requests = request
            .max_requests
            .unwrap_or(self.config.default_max_requests);
        let window_ms = request.window_ms.unwrap_or(self.config.default_window_ms);

        let loaded = match self.store.load(&self.key) {
            Ok(state) => state,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to load rate limit state, using fresh window");
                None
            }
        };

        let phase = RateLimitPhase::of(loaded.as_ref(), now, self.config.stale_buffer_ms);

        // Reads never touch storage, not even to reclaim a stale record
        if phase == RateLimitPhase::Stale && request.action != RateLimitAction::Get {
            debug!(key = %self.key, "Discarding stale rate limit window");
            if let Err(e) = self.store.delete(&self.key) {
                warn!(key = %self.key, error = %e, "Failed to delete stale rate limit state");
            }
        }

        let mut state = match (phase, loaded) {
            (RateLimitPhase::Active, Some(state)) => state,
            _ => RateLimitState::fresh(&self.key, now, window_ms),
        };

        match request.action {
            RateLimitAction::Hit => {
                state.count = state.count.saturating_add(1);
                self.persist(&state);
            }
            RateLimitAction::Reset => {
                state = RateLimitState::fresh(&self.key, now, window_ms);
                self.persist(&state);
            }
            RateLimitAction::Get => {}
        }

        let decision = RateLimitDecision::compute(state.count, max_requests, state.reset_at);
        debug!(
            key = %self.key,
            action = ?request.action,
            count = decision.count,
            allowed = decision.allowed,
            "Rate limit evaluated"
        );
        decision
    }

    /// Self-scheduled wake-up.
    ///
    /// Deletes the window when stale, then re-arms unconditionally. If re-arming
    /// fails the actor stays dormant until the next request arms it again.
    ///
    /// Returns whether a window may still be stored for this identity. When it
    /// returns `false` there is nothing left for the actor to reclaim.
    pub fn alarm(&mut self) -> bool {
        let now = self.clock.now_ms();
        self.next_alarm = None;

        let holds_window = match self.store.load(&self.key) {
            Ok(Some(state)) if state.is_stale(now, self.config.stale_buffer_ms) => {
                match self.store.delete(&self.key) {
                    Ok(()) => {
                        debug!(key = %self.key, "Reclaimed stale rate limit window");
                        false
                    }
                    Err(e) => {
                        warn!(key = %self.key, error = %e, "Failed to delete stale rate limit state");
                        true
                    }
                }
            }
            Ok(Some(_)) => true,
            Ok(None) => false,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Alarm could not load rate limit state");
                true
            }
        };

        self.arm_alarm(now);
        holds_window
    }

    fn arm_alarm(&mut self, now: i64) {
        let fire_at = now.saturating_add(self.config.alarm_interval_ms);
        match self.store.set_alarm(&self.key, fire_at) {
            Ok(()) => self.next_alarm = Some(fire_at),
            Err(e) => warn!(key = %self.key, error = %e, "Failed to arm rate limit alarm"),
        }
    }

    fn persist(&self, state: &RateLimitState) {
        if let Err(e) = self.store.save(state) {
            warn!(key = %self.key, error = %e, "Failed to persist rate limit state");
        }
    }
}
