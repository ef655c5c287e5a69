//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Conduit
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ConduitError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A payload or expression could not be validated or evaluated.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The remote data source failed to deliver a usable response.
    ///
    /// This is the only error kind the scheduler answers with a delayed
    /// retry.
    #[error("Integration fetch error: {0}")]
    Fetch(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConduitError {
    /// Whether this error came from fetching remote integration data.
    #[must_use]
    pub const fn is_fetch_error(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }
}

/// Result type alias for Conduit operations
pub type Result<T> = std::result::Result<T, ConduitError>;
