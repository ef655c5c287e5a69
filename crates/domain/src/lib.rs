//! # Conduit Domain
//!
//! Business domain types and models for the Conduit ingestion engine.
//!
//! This crate contains:
//! - Integration definitions (types, entities, sources, extraction paths)
//! - Persisted records (user integrations, credentials, logs, updates)
//! - Domain error types and Result definitions
//! - Configuration structures
//!
//! ## Architecture
//! - No dependencies on other Conduit crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
