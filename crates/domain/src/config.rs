//! Configuration management

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_HISTORICAL_FETCH_DAYS, DEFAULT_JOB_TIMEOUT_SECS, DEFAULT_MAX_TOKEN_REFRESH_TRIES,
    DEFAULT_RETRY_DELAY_SECS,
};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub definitions: DefinitionsConfig,
    #[serde(default)]
    pub user_directory: UserDirectoryConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
    #[serde(default, skip_serializing)]
    pub encryption_key: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "conduit.db".to_string(), pool_size: 8, encryption_key: None }
    }
}

/// OAuth callback configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Public base URL; callbacks land on
    /// `<callback_url_base>/integrationTypes/<type>/callback`.
    pub callback_url_base: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { callback_url_base: "http://localhost:8080".to_string() }
    }
}

/// Location of the integration definition catalogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionsConfig {
    pub path: String,
}

impl Default for DefinitionsConfig {
    fn default() -> Self {
        Self { path: "definitions.json".to_string() }
    }
}

/// External user directory (time zones)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDirectoryConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for UserDirectoryConfig {
    fn default() -> Self {
        Self { base_url: "http://localhost:8081".to_string(), timeout_seconds: 10 }
    }
}

/// Outbound HTTP client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: concat!("conduit/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Pull scheduler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Delay before the single retry after a fetch failure.
    pub retry_delay_seconds: u64,
    pub job_timeout_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            retry_delay_seconds: DEFAULT_RETRY_DELAY_SECS,
            job_timeout_seconds: DEFAULT_JOB_TIMEOUT_SECS,
        }
    }
}

/// Fetch pipeline settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Consecutive token failures tolerated before credentials are dropped.
    pub max_token_refresh_tries: u32,
    pub historical_fetch_days: i64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_token_refresh_tries: DEFAULT_MAX_TOKEN_REFRESH_TRIES,
            historical_fetch_days: DEFAULT_HISTORICAL_FETCH_DAYS,
        }
    }
}
