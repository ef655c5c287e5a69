//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Fetching
pub const DEFAULT_MAX_TOKEN_REFRESH_TRIES: u32 = 3;
pub const DEFAULT_HISTORICAL_FETCH_DAYS: i64 = 15;
pub const SUCCESS_STATUS_CODE: u16 = 200;

// Scheduling
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 10;
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 300;
pub const JITTER_UNIT_SECS: u64 = 60;

// Authentication
pub const OAUTH_METHOD: &str = "oauth";
pub const CALLBACK_PATH_PREFIX: &str = "/integrationTypes";
pub const CALLBACK_PATH_SUFFIX: &str = "/callback";
pub const PENDING_AUTHORIZATION_TTL_SECS: u64 = 600;

// Message bus keys
pub const EVENT_TIMEZONE_CHANGE: &str = "timezoneChange";
pub const EVENT_USER_DELETED: &str = "userDeleted";

// Variable placeholders
pub const VAR_DATE: &str = "DATE";
pub const VAR_DATE_TIME: &str = "DATE_TIME";
pub const VAR_DATE_TIME_MIDNIGHT: &str = "DATE_TIME_MIDNIGHT";
pub const VAR_DATE_TIME_TOMORROW_MIDNIGHT: &str = "DATE_TIME_TOMORROW_MIDNIGHT";
pub const VAR_DATE_TOMORROW: &str = "DATE_TOMORROW";
pub const VAR_START: &str = "START";
pub const VAR_END: &str = "END";
