//! Persistence seam for rate limiter actors.
//!
//! [`crate::Storage`] implements it over SQLite. [`MemoryRateLimitStore`]
//! keeps everything in process, for tests and ephemeral deployments.

use std::collections::HashMap;
use std::sync::Mutex;

use super::state::RateLimitState;
use crate::storage::{Result, StorageError};

/// Key-addressed get/put/delete of window state, plus armed alarms
pub trait RateLimitStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<RateLimitState>>;
    fn save(&self, state: &RateLimitState) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
    /// Arm (or move) the wake-up of `key` to `fire_at` epoch milliseconds
    fn set_alarm(&self, key: &str, fire_at: i64) -> Result<()>;
    /// All armed alarms, earliest first
    fn pending_alarms(&self) -> Result<Vec<(String, i64)>>;
}

#[derive(Default)]
struct MemoryInner {
    states: HashMap<String, RateLimitState>,
    alarms: HashMap<String, i64>,
}

/// In-process [`RateLimitStore`]
#[derive(Default)]
pub struct MemoryRateLimitStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| StorageError::Init("Rate limit store lock poisoned".into()))
    }

    /// Number of identities with a stored window
    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.states.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RateLimitStore for MemoryRateLimitStore {
    fn load(&self, key: &str) -> Result<Option<RateLimitState>> {
        Ok(self.lock()?.states.get(key).cloned())
    }

    fn save(&self, state: &RateLimitState) -> Result<()> {
        self.lock()?.states.insert(state.key.clone(), state.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.states.remove(key);
        Ok(())
    }

    fn set_alarm(&self, key: &str, fire_at: i64) -> Result<()> {
        self.lock()?.alarms.insert(key.to_string(), fire_at);
        Ok(())
    }

    fn pending_alarms(&self) -> Result<Vec<(String, i64)>> {
        let mut alarms: Vec<(String, i64)> = self
            .lock()?
            .alarms
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        alarms.sort_by_key(|(_, fire_at)| *fire_at);
        Ok(alarms)
    }
}
