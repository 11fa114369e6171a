//! Test Database Manager
//!
//! Provides isolated database instances for testing:
//! - Temporary databases that are automatically cleaned up
//! - Pre-seeded conversations
//! - Reopening the same file to simulate a process restart

use std::path::PathBuf;
use std::sync::Arc;

use dreamlog_core::{ConversationKey, Message, Role, Storage};
use tempfile::TempDir;

/// Manager for test databases
///
/// Creates isolated database instances for each test to prevent interference.
/// Automatically cleans up temporary databases when dropped.
///
/// # Example
///
/// ```rust,ignore
/// let db = TestDatabaseManager::new_temp();
/// let key = ConversationKey::new("dream", "block");
/// db.seed_conversation(&key, 4);
///
/// // Database is automatically deleted when `db` goes out of scope
/// ```
pub struct TestDatabaseManager {
    /// The storage instance
    pub storage: Arc<Storage>,
    /// Temporary directory (kept alive to prevent premature deletion)
    _temp_dir: Option<TempDir>,
    /// Path to the database file
    db_path: PathBuf,
}

impl TestDatabaseManager {
    /// Create a new test database in a temporary directory
    pub fn new_temp() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test_dreamlog.db");

        let storage = Storage::new(Some(db_path.clone())).expect("Failed to create test storage");

        Self {
            storage: Arc::new(storage),
            _temp_dir: Some(temp_dir),
            db_path,
        }
    }

    /// Create a test database at a specific path
    ///
    /// The database is NOT automatically deleted.
    pub fn new_at_path(path: PathBuf) -> Self {
        let storage = Storage::new(Some(path.clone())).expect("Failed to create test storage");

        Self {
            storage: Arc::new(storage),
            _temp_dir: None,
            db_path: path,
        }
    }

    /// Get the database path
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Number of messages in a conversation
    pub fn message_count(&self, key: &ConversationKey) -> u64 {
        self.storage.count_messages(key).unwrap_or(0)
    }

    /// Stored summary cursor, 0 when no summary exists
    pub fn cursor(&self, key: &ConversationKey) -> u64 {
        self.storage
            .get_summary(key)
            .ok()
            .flatten()
            .map_or(0, |s| s.last_processed_count)
    }

    // ========================================================================
    // SEEDING METHODS
    // ========================================================================

    /// Seed a conversation with `count` alternating user/assistant turns
    pub fn seed_conversation(&self, key: &ConversationKey, count: usize) -> Vec<Message> {
        let offset = self.message_count(key) as usize;
        (0..count)
            .map(|i| {
                let n = offset + i;
                let (role, content) = if n % 2 == 0 {
                    (Role::User, format!("Dreamer turn {n}"))
                } else {
                    (Role::Assistant, format!("Guide turn {n}"))
                };
                self.storage
                    .append_message(key, role, &content)
                    .expect("Failed to seed message")
            })
            .collect()
    }

    // ========================================================================
    // RESTART
    // ========================================================================

    /// Open a second handle on the same file, as a restarted process would.
    ///
    /// The old handle stays usable; callers drop it to finish the "restart".
    pub fn reopen(&mut self) -> Arc<Storage> {
        let storage =
            Storage::new(Some(self.db_path.clone())).expect("Failed to reopen test storage");
        self.storage = Arc::new(storage);
        self.storage.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_database_creation() {
        let db = TestDatabaseManager::new_temp();
        assert!(db.path().exists());
        assert_eq!(db.message_count(&ConversationKey::new("d", "b")), 0);
    }

    #[test]
    fn test_seed_conversation_alternates_roles() {
        let db = TestDatabaseManager::new_temp();
        let key = ConversationKey::new("d", "b");

        let first = db.seed_conversation(&key, 3);
        let more = db.seed_conversation(&key, 2);

        assert_eq!(first[0].role, Role::User);
        assert_eq!(first[1].role, Role::Assistant);
        assert_eq!(more[0].content, "Guide turn 3");
        assert_eq!(db.message_count(&key), 5);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let mut db = TestDatabaseManager::new_temp();
        let key = ConversationKey::new("d", "b");
        db.seed_conversation(&key, 2);
        db.storage.upsert_summary(&key, "kept", 2).unwrap();

        db.reopen();
        assert_eq!(db.message_count(&key), 2);
        assert_eq!(db.cursor(&key), 2);
    }
}
