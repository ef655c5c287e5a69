//! Modular common utilities shared across Conduit crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: plain data helpers
//! - `runtime`: async coordination (single-flight) and ingestion counters
//! - `platform`: OAuth helpers (PKCE, token types)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod observability;
#[cfg(feature = "runtime")]
pub mod sync;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod auth;

// Re-export commonly used types for convenience
// ------------------------
#[cfg(feature = "platform")]
pub use auth::{PKCEChallenge, TokenResponse, TokenSet};
#[cfg(feature = "runtime")]
pub use observability::{IngestionMetrics, IngestionMetricsSnapshot};
#[cfg(feature = "runtime")]
pub use sync::SingleFlight;
