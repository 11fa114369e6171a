//! End-to-end test support for dreamlog
//!
//! - `harness`: isolated databases
//! - `mocks`: scripted text generation and dream fixtures

pub mod harness;
pub mod mocks;

pub use harness::TestDatabaseManager;
pub use mocks::{BlockFixture, DreamFixture, ScriptedGenerator};
