//! Rolling Summaries
//!
//! Keeps one bounded summary per conversation that covers the whole message
//! log, without ever re-reading turns it already folded in.
//!
//! `refresh` compresses only when enough unprocessed turns have piled up
//! ([`SummaryConfig::threshold`]), except that the very first summary is
//! always created. A failed generation call leaves the stored summary and its
//! cursor untouched, so the same turns are retried on the next refresh.
//!
//! Concurrent refreshes of one conversation are serialized by a per-key lock,
//! and the storage upsert refuses to move the cursor backwards.

pub mod prompt;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::dialogue::{ConversationKey, SummaryRecord};
use crate::llm::TextGenerator;
use crate::storage::{Storage, StorageError};

/// Unprocessed turns needed before an existing summary is recompressed
pub const DEFAULT_THRESHOLD: u64 = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryConfig {
    pub threshold: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_tokens: 512,
            temperature: 0.3,
        }
    }
}

/// Summary error type. Generation failures never surface here.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// What a refresh did
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// No messages and no summary yet
    Empty,
    /// Too few new turns; the stored summary was returned as is
    Skipped {
        summary: SummaryRecord,
        pending: u64,
    },
    /// New turns were folded in and the cursor advanced
    Compressed {
        summary: SummaryRecord,
        compressed: u64,
    },
    /// Generation failed; nothing changed and the turns stay pending
    Deferred {
        previous: Option<SummaryRecord>,
        pending: u64,
        reason: String,
    },
}

impl RefreshOutcome {
    /// The summary as it stands after the refresh
    pub fn record(&self) -> Option<&SummaryRecord> {
        match self {
            RefreshOutcome::Empty => None,
            RefreshOutcome::Skipped { summary, .. } => Some(summary),
            RefreshOutcome::Compressed { summary, .. } => Some(summary),
            RefreshOutcome::Deferred { previous, .. } => previous.as_ref(),
        }
    }

    pub fn summary_text(&self) -> Option<&str> {
        self.record().map(|s| s.summary_text.as_str())
    }

    pub fn last_processed_count(&self) -> u64 {
        self.record().map_or(0, |s| s.last_processed_count)
    }

    /// Stable lowercase name for logs and API responses
    pub fn status(&self) -> &'static str {
        match self {
            RefreshOutcome::Empty => "empty",
            RefreshOutcome::Skipped { .. } => "skipped",
            RefreshOutcome::Compressed { .. } => "compressed",
            RefreshOutcome::Deferred { .. } => "deferred",
        }
    }
}

pub struct SummaryEngine {
    storage: Arc<Storage>,
    generator: Arc<dyn TextGenerator>,
    config: SummaryConfig,
    key_locks: KeyLocks,
}

type KeyLocks = std::sync::Mutex<HashMap<ConversationKey, Arc<Mutex<()>>>>;

/// Shared handle on one conversation's refresh lock.
///
/// Dropping the last lease removes the map entry, also when the refresh
/// future is cancelled halfway through.
struct KeyLockLease<'a> {
    locks: &'a KeyLocks,
    key: ConversationKey,
    lock: Arc<Mutex<()>>,
}

impl Drop for KeyLockLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // One reference in the map, one here
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}

impl SummaryEngine {
    pub fn new(storage: Arc<Storage>, generator: Arc<dyn TextGenerator>) -> Self {
        Self::with_config(storage, generator, SummaryConfig::default())
    }

    pub fn with_config(
        storage: Arc<Storage>,
        generator: Arc<dyn TextGenerator>,
        config: SummaryConfig,
    ) -> Self {
        Self {
            storage,
            generator,
            config,
            key_locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SummaryConfig {
        &self.config
    }

    /// Bring the summary of `key` up to date if enough turns are pending.
    ///
    /// `anchor_text` is the dream passage the conversation is about.
    pub async fn refresh(
        &self,
        key: &ConversationKey,
        anchor_text: &str,
    ) -> Result<RefreshOutcome, SummaryError> {
        let lease = self.lease(key);
        let _guard = lease.lock.lock().await;
        self.refresh_locked(key, anchor_text).await
    }

    async fn refresh_locked(
        &self,
        key: &ConversationKey,
        anchor_text: &str,
    ) -> Result<RefreshOutcome, SummaryError> {
        let existing = self.storage.get_summary(key)?;
        let messages = self.storage.list_messages(key)?;

        let total = messages.len() as u64;
        let processed = existing
            .as_ref()
            .map_or(0, |s| s.last_processed_count)
            .min(total);
        let pending = total - processed;

        if let Some(summary) = existing.as_ref() {
            if pending < self.config.threshold {
                debug!(conversation = %key, pending, "Summary refresh below threshold");
                return Ok(RefreshOutcome::Skipped {
                    summary: summary.clone(),
                    pending,
                });
            }
        }

        if pending == 0 {
            return Ok(RefreshOutcome::Empty);
        }

        let request = prompt::compression_request(
            anchor_text,
            existing.as_ref().map(|s| s.summary_text.as_str()),
            &messages[processed as usize..],
            &self.config,
        );

        match self.generator.generate(request).await {
            Ok(text) => {
                let summary = self.storage.upsert_summary(key, &text, total)?;
                info!(
                    conversation = %key,
                    compressed = pending,
                    last_processed_count = summary.last_processed_count,
                    "Rolling summary updated"
                );
                Ok(RefreshOutcome::Compressed {
                    summary,
                    compressed: pending,
                })
            }
            Err(e) => {
                warn!(
                    conversation = %key,
                    pending,
                    error = %e,
                    "Summary generation failed, keeping previous summary"
                );
                Ok(RefreshOutcome::Deferred {
                    previous: existing,
                    pending,
                    reason: e.to_string(),
                })
            }
        }
    }

    fn lease(&self, key: &ConversationKey) -> KeyLockLease<'_> {
        let mut locks = self.key_locks.lock().unwrap_or_else(|e| e.into_inner());
        let lock = locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        KeyLockLease {
            locks: &self.key_locks,
            key: key.clone(),
            lock,
        }
    }
}
