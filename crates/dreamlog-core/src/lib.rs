//! # Dreamlog Core
//!
//! Backend core for a dream journal: a user narrates a dream, splits it into
//! blocks, and talks with a text-interpretation service about each block.
//!
//! Two subsystems carry the weight:
//!
//! - **Admission control**: [`RateLimiterActor`] keeps a sliding window per
//!   identity in state it alone owns, persisted through a [`RateLimitStore`].
//!   [`RateLimiterHost`] gives every identity its own mailbox task so calls for
//!   one identity run strictly one after another, and each actor re-arms its own
//!   cleanup alarm so stale windows are eventually reclaimed.
//! - **Rolling summaries**: [`SummaryEngine`] compresses the unbounded message log
//!   of a `(dream, block)` conversation into one bounded summary, only once enough
//!   unprocessed turns have piled up. [`InterpretationPipeline`] turns those
//!   summaries into a final, one-shot interpretation.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dreamlog_core::{
//!     ConversationKey, HttpGeneratorConfig, HttpTextGenerator, Role, Storage, SummaryEngine,
//! };
//!
//! let storage = Arc::new(Storage::new(None)?);
//! let key = ConversationKey::new("dream-1", "block-1");
//! storage.append_message(&key, Role::User, "I was flying over a flooded city")?;
//!
//! let config = HttpGeneratorConfig::new("http://127.0.0.1:8080/generate");
//! let generator = Arc::new(HttpTextGenerator::new(config));
//! let engine = SummaryEngine::new(storage.clone(), generator);
//! let outcome = engine.refresh(&key, "A flooded city seen from above").await?;
//! println!("{:?}", outcome.summary_text());
//! ```
//!
//! ## Feature Flags
//!
//! - `bundled-sqlite` (default): Compile SQLite from source
//! - `encryption`: SQLCipher, keyed by `DREAMLOG_ENCRYPTION_KEY`

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod conversation;
pub mod dialogue;
pub mod interpret;
pub mod llm;
pub mod storage;
pub mod summary;

/// Per-identity admission control actors
pub mod ratelimit;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Dialogue types
pub use dialogue::{ConversationKey, Message, Role, RoleParseError, SummaryRecord};

// Storage layer
pub use storage::{Result, Storage, StorageError};

// Rate limiting
pub use ratelimit::{
    Clock, ManualClock, MemoryRateLimitStore, RateLimitAction, RateLimitConfig,
    RateLimitDecision, RateLimitError, RateLimitPhase, RateLimitRequest, RateLimitState,
    RateLimitStore, RateLimiterActor, RateLimiterHost, SystemClock,
};

// Text generation
pub use llm::{
    ChatMessage, ChatRole, GenerationError, GenerationRequest, HttpGeneratorConfig,
    HttpTextGenerator, TextGenerator,
};

// Rolling summaries
pub use summary::{RefreshOutcome, SummaryConfig, SummaryEngine, SummaryError};

// Final interpretation
pub use interpret::{InterpretationConfig, InterpretationError, InterpretationPipeline};

// Conversation turns
pub use conversation::{
    ConversationConfig, ConversationError, ConversationService, TurnReply, TurnView,
};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default database file name inside the platform data directory
pub const DEFAULT_DB_FILE: &str = "dreamlog.db";
