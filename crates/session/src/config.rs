//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `MINEFORNOW_API_URL` - Marketplace API base URL (default: `http://localhost:8080`)
//! - `MINEFORNOW_STATE_FILE` - Where the credential and cached user are kept
//!   (default: `.minefornow/session.json`)
//! - `MINEFORNOW_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `MINEFORNOW_UPGRADE_PATH` - Owner upgrade endpoint (default: `/api/users/upgrade`)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_STATE_FILE: &str = ".minefornow/session.json";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_UPGRADE_PATH: &str = "/api/users/upgrade";

/// Upper bound on the request timeout; anything longer is a typo.
const MAX_TIMEOUT_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Session client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Marketplace API base URL, always ending in `/`
    pub api_url: Url,
    /// Persistent storage file for the credential and cached user
    pub state_file: PathBuf,
    /// Timeout applied to every API request
    pub request_timeout: Duration,
    /// Path of the owner upgrade endpoint
    pub upgrade_path: String,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL)
                .map(with_trailing_slash)
                .unwrap_or_else(|_| unreachable!("default API URL is valid")),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            upgrade_path: DEFAULT_UPGRADE_PATH.to_string(),
            sentry_dsn: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_api_url(&get_env_or_default("MINEFORNOW_API_URL", DEFAULT_API_URL))?;
        let state_file = PathBuf::from(get_env_or_default(
            "MINEFORNOW_STATE_FILE",
            DEFAULT_STATE_FILE,
        ));
        let request_timeout = parse_timeout(&get_env_or_default(
            "MINEFORNOW_REQUEST_TIMEOUT_SECS",
            &DEFAULT_TIMEOUT_SECS.to_string(),
        ))?;
        let upgrade_path = parse_upgrade_path(&get_env_or_default(
            "MINEFORNOW_UPGRADE_PATH",
            DEFAULT_UPGRADE_PATH,
        ))?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            api_url,
            state_file,
            request_timeout,
            upgrade_path,
            sentry_dsn,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional, non-empty environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_api_url(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim()).map_err(|e| {
        ConfigError::InvalidEnvVar("MINEFORNOW_API_URL".to_string(), e.to_string())
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "MINEFORNOW_API_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    Ok(with_trailing_slash(url))
}

/// Endpoint paths are joined onto the base URL, which drops the last path
/// segment unless it ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn parse_timeout(value: &str) -> Result<Duration, ConfigError> {
    let secs = value.trim().parse::<u64>().map_err(|e| {
        ConfigError::InvalidEnvVar(
            "MINEFORNOW_REQUEST_TIMEOUT_SECS".to_string(),
            e.to_string(),
        )
    })?;

    if secs == 0 || secs > MAX_TIMEOUT_SECS {
        return Err(ConfigError::InvalidEnvVar(
            "MINEFORNOW_REQUEST_TIMEOUT_SECS".to_string(),
            format!("must be between 1 and {MAX_TIMEOUT_SECS} seconds (got {secs})"),
        ));
    }

    Ok(Duration::from_secs(secs))
}

fn parse_upgrade_path(value: &str) -> Result<String, ConfigError> {
    let path = value.trim();
    if path.trim_matches('/').is_empty() || path.contains("://") {
        return Err(ConfigError::InvalidEnvVar(
            "MINEFORNOW_UPGRADE_PATH".to_string(),
            format!("'{path}' is not an API path"),
        ));
    }
    Ok(path.to_string())
}
