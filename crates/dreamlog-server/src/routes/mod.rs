//! HTTP routes

pub mod dreams;
pub mod health;
pub mod ratelimit;

/// Header carrying the verified identity from the upstream auth layer
pub const IDENTITY_HEADER: &str = "x-user-id";
