//! # Conduit API
//!
//! Application layer - wiring and main entry point.
//!
//! This crate contains:
//! - Application context (dependency injection)
//! - The line-oriented event bus reader
//! - Logging setup
//!
//! ## Architecture
//! - Depends on `common`, `core`, and `infra`
//! - Wires up the hexagonal architecture

pub mod bus;
pub mod context;
pub mod utils;

// Re-export for convenience
pub use context::*;
