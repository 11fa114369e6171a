//! Storage Module
//!
//! SQLite-based storage layer with:
//! - Append-only per-conversation message log
//! - One rolling summary per conversation, written through a monotonic upsert
//! - Rate limiter windows and armed alarms

mod migrations;
mod sqlite;

pub use migrations::MIGRATIONS;
pub use sqlite::{Result, Storage, StorageError};
