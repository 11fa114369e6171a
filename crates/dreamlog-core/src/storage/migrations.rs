//! Database Migrations
//!
//! Schema migration definitions for the storage layer.

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Dialogue log and rolling summaries",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Rate limiter state and armed alarms",
        up: MIGRATION_V2_UP,
    },
    Migration {
        version: 3,
        description: "Order messages by insertion sequence",
        up: MIGRATION_V3_UP,
    },
];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: Initial schema
///
/// `created_at` is stored as fixed-width RFC3339 with microseconds so that
/// lexical order equals chronological order; `rowid` breaks ties.
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    dream_id TEXT NOT NULL,
    block_id TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation
    ON messages(dream_id, block_id, created_at);

CREATE TABLE IF NOT EXISTS dialog_summaries (
    id TEXT PRIMARY KEY,
    dream_id TEXT NOT NULL,
    block_id TEXT NOT NULL,
    summary TEXT NOT NULL,
    last_processed_count INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    UNIQUE (dream_id, block_id)
);

CREATE INDEX IF NOT EXISTS idx_summaries_dream ON dialog_summaries(dream_id);

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

/// V2: Rate limiter persistence
///
/// One row per identity. Alarms live in their own table because a stale
/// window row is deleted while its alarm keeps re-arming.
const MIGRATION_V2_UP: &str = r#"
CREATE TABLE IF NOT EXISTS rate_limits (
    key TEXT PRIMARY KEY,
    count INTEGER NOT NULL DEFAULT 0,
    reset_at INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS rate_limit_alarms (
    key TEXT PRIMARY KEY,
    fire_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_alarms_fire_at ON rate_limit_alarms(fire_at);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (2, datetime('now'));
"#;

/// V3: Insertion-ordered message log
///
/// Summary cursors count messages, so a conversation's order must never change
/// once written. Wall-clock `created_at` can go backwards (clock steps, appends
/// that race for the writer), so order comes from an autoincrement `seq`.
/// Existing rows keep their previous order.
const MIGRATION_V3_UP: &str = r#"
BEGIN;

CREATE TABLE messages_v3 (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    dream_id TEXT NOT NULL,
    block_id TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);

INSERT INTO messages_v3 (id, dream_id, block_id, role, content, created_at)
    SELECT id, dream_id, block_id, role, content, created_at
    FROM messages
    ORDER BY created_at ASC, rowid ASC;

DROP TABLE messages;
ALTER TABLE messages_v3 RENAME TO messages;

CREATE INDEX IF NOT EXISTS idx_messages_conversation
    ON messages(dream_id, block_id, seq);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (3, datetime('now'));

COMMIT;
"#;

/// Get current schema version from database
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply pending migrations
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );

            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}
