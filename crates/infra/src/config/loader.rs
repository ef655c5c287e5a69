//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! Required:
//! - `CONDUIT_DB_PATH`: Database file path
//! - `CONDUIT_CALLBACK_URL_BASE`: Public base URL for OAuth callbacks
//!
//! Optional (defaults apply when unset):
//! - `CONDUIT_DB_POOL_SIZE`: Connection pool size
//! - `CONDUIT_DB_ENCRYPTION_KEY`: SQLCipher key
//! - `CONDUIT_DEFINITIONS_PATH`: Integration definition catalogue
//! - `CONDUIT_USER_DIRECTORY_URL`: Base URL of the user directory
//! - `CONDUIT_USER_DIRECTORY_TIMEOUT`: Directory request timeout in seconds
//! - `CONDUIT_HTTP_TIMEOUT`: Outbound request timeout in seconds
//! - `CONDUIT_HTTP_MAX_ATTEMPTS`: Attempts per outbound request
//! - `CONDUIT_RETRY_DELAY`: Delay before a failed pull is retried, in seconds
//! - `CONDUIT_JOB_TIMEOUT`: Upper bound for one scheduled run, in seconds
//! - `CONDUIT_MAX_TOKEN_REFRESH_TRIES`: Token failures before credentials are
//!   dropped
//! - `CONDUIT_HISTORICAL_FETCH_DAYS`: Length of the historical window
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./conduit.json` or `./conduit.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use conduit_domain::{
    AuthConfig, ConduitError, Config, DatabaseConfig, DefinitionsConfig, FetchConfig, HttpConfig, Result,
    SchedulerConfig, UserDirectoryConfig,
};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `ConduitError::Config` if configuration cannot be loaded from
/// either source or a value is malformed.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// See module documentation for the complete list.
///
/// # Errors
/// Returns `ConduitError::Config` if required variables are missing or any
/// variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let defaults = Config::default();

    let database = DatabaseConfig {
        path: env_var("CONDUIT_DB_PATH")?,
        pool_size: env_parse("CONDUIT_DB_POOL_SIZE", defaults.database.pool_size)?,
        encryption_key: std::env::var("CONDUIT_DB_ENCRYPTION_KEY").ok().filter(|key| !key.is_empty()),
    };
    let auth = AuthConfig { callback_url_base: env_var("CONDUIT_CALLBACK_URL_BASE")? };

    let definitions = DefinitionsConfig {
        path: std::env::var("CONDUIT_DEFINITIONS_PATH").unwrap_or(defaults.definitions.path),
    };
    let user_directory = UserDirectoryConfig {
        base_url: std::env::var("CONDUIT_USER_DIRECTORY_URL").unwrap_or(defaults.user_directory.base_url),
        timeout_seconds: env_parse("CONDUIT_USER_DIRECTORY_TIMEOUT", defaults.user_directory.timeout_seconds)?,
    };
    let http = HttpConfig {
        timeout_seconds: env_parse("CONDUIT_HTTP_TIMEOUT", defaults.http.timeout_seconds)?,
        user_agent: defaults.http.user_agent,
    };
    let scheduler = SchedulerConfig {
        retry_delay_seconds: env_parse("CONDUIT_RETRY_DELAY", defaults.scheduler.retry_delay_seconds)?,
        job_timeout_seconds: env_parse("CONDUIT_JOB_TIMEOUT", defaults.scheduler.job_timeout_seconds)?,
    };
    let fetch = FetchConfig {
        max_token_refresh_tries: env_parse(
            "CONDUIT_MAX_TOKEN_REFRESH_TRIES",
            defaults.fetch.max_token_refresh_tries,
        )?,
        historical_fetch_days: env_parse("CONDUIT_HISTORICAL_FETCH_DAYS", defaults.fetch.historical_fetch_days)?,
    };

    Ok(Config { database, auth, definitions, user_directory, http, scheduler, fetch })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `ConduitError::Config` if the file is missing, no file is found
/// when probing, or the contents do not parse.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConduitError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ConduitError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ConduitError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content; format follows the extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| ConduitError::Config(format!("Invalid TOML format: {e}"))),
        "json" => {
            serde_json::from_str(contents).map_err(|e| ConduitError::Config(format!("Invalid JSON format: {e}")))
        }
        _ => Err(ConduitError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// Returns the first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("conduit.json"),
        dir.join("conduit.toml"),
        dir.join("../config.json"),
        dir.join("../config.toml"),
    ]
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| ConduitError::Config(format!("Missing required environment variable: {key}")))
}

/// Parse an optional environment variable, falling back to `default` when
/// unset.
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|e| ConduitError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(default),
    }
}
