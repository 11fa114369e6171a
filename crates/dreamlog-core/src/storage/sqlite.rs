//! SQLite Storage Implementation
//!
//! The dialogue store: message log, rolling summaries, and the persisted
//! state of the rate limiter actors.

use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

use crate::dialogue::{ConversationKey, Message, Role, SummaryRecord};
use crate::ratelimit::{RateLimitState, RateLimitStore};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Storage error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid timestamp
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

// ============================================================================
// STORAGE
// ============================================================================

/// Main storage struct
///
/// Uses separate reader/writer connections for interior mutability.
/// All methods take `&self`, so callers share it as `Arc<Storage>`.
/// Every method is its own transaction; nothing here spans calls.
pub struct Storage {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl Storage {
    /// Apply PRAGMAs and optional encryption to a connection
    fn configure_connection(conn: &Connection) -> Result<()> {
        #[cfg(feature = "encryption")]
        {
            if let Ok(key) = std::env::var("DREAMLOG_ENCRYPTION_KEY") {
                if !key.is_empty() {
                    conn.pragma_update(None, "key", &key)?;
                }
            }
        }

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -16000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        Ok(())
    }

    /// Create new storage instance
    ///
    /// `None` places the database in the platform data directory.
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => {
                let proj_dirs = ProjectDirs::from("com", "dreamlog", "core").ok_or_else(|| {
                    StorageError::Init("Could not determine project directories".to_string())
                })?;

                let data_dir = proj_dirs.data_dir();
                std::fs::create_dir_all(data_dir)?;
                // Restrict directory permissions to owner-only on Unix
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let perms = std::fs::Permissions::from_mode(0o700);
                    let _ = std::fs::set_permissions(data_dir, perms);
                }
                data_dir.join(crate::DEFAULT_DB_FILE)
            }
        };

        let writer_conn = Connection::open(&path)?;

        #[cfg(unix)]
        if path.exists() {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&path, perms);
        }

        Self::configure_connection(&writer_conn)?;

        // Apply migrations on writer only
        let applied = super::migrations::apply_migrations(&writer_conn)?;
        if applied > 0 {
            tracing::info!(applied, path = %path.display(), "Database schema up to date");
        }

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
        })
    }

    fn writer(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| StorageError::Init("Writer lock poisoned".into()))
    }

    fn reader(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| StorageError::Init("Reader lock poisoned".into()))
    }

    /// Fixed-width RFC3339 so text order matches time order
    fn format_timestamp(ts: DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Parse RFC3339 timestamp
    fn parse_timestamp(value: &str, field_name: &str) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("Invalid {} timestamp '{}': {}", field_name, value, e),
                    )),
                )
            })
    }

    fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
        let role: String = row.get("role")?;
        let role = role.parse::<Role>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;
        let created_at: String = row.get("created_at")?;

        Ok(Message {
            id: row.get("id")?,
            conversation_key: ConversationKey::new(
                row.get::<_, String>("dream_id")?,
                row.get::<_, String>("block_id")?,
            ),
            role,
            content: row.get("content")?,
            created_at: Self::parse_timestamp(&created_at, "created_at")?,
        })
    }

    fn row_to_summary(row: &rusqlite::Row) -> rusqlite::Result<SummaryRecord> {
        let updated_at: String = row.get("updated_at")?;
        let last_processed: i64 = row.get("last_processed_count")?;

        Ok(SummaryRecord {
            id: row.get("id")?,
            conversation_key: ConversationKey::new(
                row.get::<_, String>("dream_id")?,
                row.get::<_, String>("block_id")?,
            ),
            summary_text: row.get("summary")?,
            last_processed_count: last_processed.max(0) as u64,
            updated_at: Self::parse_timestamp(&updated_at, "updated_at")?,
        })
    }

    // ========================================================================
    // MESSAGES
    // ========================================================================

    /// Append a message to a conversation log
    pub fn append_message(
        &self,
        key: &ConversationKey,
        role: Role,
        content: &str,
    ) -> Result<Message> {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            conversation_key: key.clone(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };

        let writer = self.writer()?;
        writer.execute(
            "INSERT INTO messages (id, dream_id, block_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id,
                key.dream_id,
                key.block_id,
                role.as_str(),
                message.content,
                Self::format_timestamp(message.created_at),
            ],
        )?;

        Ok(message)
    }

    /// All messages of a conversation in append order
    pub fn list_messages(&self, key: &ConversationKey) -> Result<Vec<Message>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT id, dream_id, block_id, role, content, created_at
             FROM messages
             WHERE dream_id = ?1 AND block_id = ?2
             ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map(params![key.dream_id, key.block_id], Self::row_to_message)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// The last `limit` messages of a conversation, oldest first
    pub fn recent_messages(&self, key: &ConversationKey, limit: usize) -> Result<Vec<Message>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT id, dream_id, block_id, role, content, created_at
             FROM messages
             WHERE dream_id = ?1 AND block_id = ?2
             ORDER BY seq DESC
             LIMIT ?3",
        )?;

        let rows = stmt.query_map(
            params![key.dream_id, key.block_id, limit as i64],
            Self::row_to_message,
        )?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        result.reverse();
        Ok(result)
    }

    /// Number of messages in a conversation
    pub fn count_messages(&self, key: &ConversationKey) -> Result<u64> {
        let reader = self.reader()?;
        let count: i64 = reader.query_row(
            "SELECT COUNT(*) FROM messages WHERE dream_id = ?1 AND block_id = ?2",
            params![key.dream_id, key.block_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    // ========================================================================
    // SUMMARIES
    // ========================================================================

    /// Get the rolling summary of a conversation, if one was ever written
    pub fn get_summary(&self, key: &ConversationKey) -> Result<Option<SummaryRecord>> {
        let reader = self.reader()?;
        let summary = reader
            .query_row(
                "SELECT id, dream_id, block_id, summary, last_processed_count, updated_at
                 FROM dialog_summaries
                 WHERE dream_id = ?1 AND block_id = ?2",
                params![key.dream_id, key.block_id],
                Self::row_to_summary,
            )
            .optional()?;
        Ok(summary)
    }

    /// Insert or update the summary of a conversation
    ///
    /// Idempotent and keyed by conversation. A write whose cursor is behind the
    /// stored one is ignored, so the cursor never moves backwards. Returns the
    /// record as stored after the write.
    pub fn upsert_summary(
        &self,
        key: &ConversationKey,
        summary_text: &str,
        last_processed_count: u64,
    ) -> Result<SummaryRecord> {
        {
            let writer = self.writer()?;
            let changed = writer.execute(
                "INSERT INTO dialog_summaries (
                    id, dream_id, block_id, summary, last_processed_count, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(dream_id, block_id) DO UPDATE SET
                    summary = excluded.summary,
                    last_processed_count = excluded.last_processed_count,
                    updated_at = excluded.updated_at
                 WHERE excluded.last_processed_count >= dialog_summaries.last_processed_count",
                params![
                    Uuid::new_v4().to_string(),
                    key.dream_id,
                    key.block_id,
                    summary_text,
                    last_processed_count as i64,
                    Self::format_timestamp(Utc::now()),
                ],
            )?;

            if changed == 0 {
                tracing::debug!(
                    conversation = %key,
                    last_processed_count,
                    "Summary upsert lost to a newer cursor"
                );
            }
        }

        self.get_summary(key)?
            .ok_or_else(|| StorageError::NotFound(format!("summary for {}", key)))
    }

    /// Every block summary of a dream, ordered by block id
    pub fn list_dream_summaries(&self, dream_id: &str) -> Result<Vec<SummaryRecord>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT id, dream_id, block_id, summary, last_processed_count, updated_at
             FROM dialog_summaries
             WHERE dream_id = ?1
             ORDER BY block_id ASC",
        )?;

        let rows = stmt.query_map(params![dream_id], Self::row_to_summary)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

// ============================================================================
// RATE LIMITER PERSISTENCE
// ============================================================================

impl RateLimitStore for Storage {
    fn load(&self, key: &str) -> Result<Option<RateLimitState>> {
        let reader = self.reader()?;
        let state = reader
            .query_row(
                "SELECT key, count, reset_at FROM rate_limits WHERE key = ?1",
                params![key],
                |row| {
                    let count: i64 = row.get("count")?;
                    Ok(RateLimitState {
                        key: row.get("key")?,
                        count: count.clamp(0, u32::MAX as i64) as u32,
                        reset_at: row.get("reset_at")?,
                    })
                },
            )
            .optional()?;
        Ok(state)
    }

    fn save(&self, state: &RateLimitState) -> Result<()> {
        let writer = self.writer()?;
        writer.execute(
            "INSERT OR REPLACE INTO rate_limits (key, count, reset_at) VALUES (?1, ?2, ?3)",
            params![state.key, state.count as i64, state.reset_at],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let writer = self.writer()?;
        writer.execute("DELETE FROM rate_limits WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn set_alarm(&self, key: &str, fire_at: i64) -> Result<()> {
        let writer = self.writer()?;
        writer.execute(
            "INSERT OR REPLACE INTO rate_limit_alarms (key, fire_at) VALUES (?1, ?2)",
            params![key, fire_at],
        )?;
        Ok(())
    }

    fn pending_alarms(&self) -> Result<Vec<(String, i64)>> {
        let reader = self.reader()?;
        let mut stmt =
            reader.prepare("SELECT key, fire_at FROM rate_limit_alarms ORDER BY fire_at ASC")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

// ============================================================================
// TESTS
// ============================================================================
