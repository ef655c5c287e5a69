//! # Conduit Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - Database implementations (SQLite/SQLCipher)
//! - HTTP fetchers, including the OAuth 2.0 authenticated client
//! - The file-backed definition catalogue and the user directory client
//! - The cron job runner
//!
//! ## Architecture
//! - Implements traits defined in `conduit-core`
//! - Depends on `conduit-common` and `conduit-domain`
//! - Contains all "impure" code (I/O, network, timers)

pub mod auth;
pub mod config;
pub mod database;
pub mod definitions;
pub mod directory;
pub mod errors;
pub mod http;
pub mod scheduling;

// Re-export commonly used items
pub use auth::{OAuthAuthenticationFactory, OAuthAuthenticationMethod};
pub use database::*;
pub use definitions::FileDefinitionSource;
pub use directory::HttpUserDirectory;
pub use errors::InfraError;
pub use http::{HttpClient, ReqwestFetcher};
pub use scheduling::{CronJobRunner, CronJobRunnerConfig};
