//! Test doubles and fixtures

mod fixtures;
mod generator;

pub use fixtures::{BlockFixture, DreamFixture};
pub use generator::ScriptedGenerator;
