//! Port interfaces for fetching remote integration data

use std::collections::HashMap;

use async_trait::async_trait;
use conduit_domain::Result;
use thiserror::Error;

/// Raw response of a GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Why a request produced no response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    /// The client could not obtain a valid access token.
    #[error("token retrieval failed: {0}")]
    TokenRetrieval(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Performs outbound GET requests, authenticated or not.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get(&self, url: &str) -> std::result::Result<FetchResponse, FetchFailure>;
}

/// User profile lookups owned by another service.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// IANA zone name of one user.
    async fn get_user_time_zone(&self, user_id: &str) -> Result<String>;

    /// IANA zone names keyed by user id; unknown users are absent.
    async fn get_users_time_zones(&self, user_ids: &[String]) -> Result<HashMap<String, String>>;
}
