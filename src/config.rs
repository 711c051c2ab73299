//! Runtime configuration from environment variables

use crate::error::ConfigError;
use crate::fetch::FetchSettings;
use std::env;
use std::time::Duration;

/// Configuration for the web service and its fetch cycles
///
/// Loaded from environment variables with sensible defaults. Only the
/// consumer key and secret are mandatory.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Twitter consumer key (API key)
    pub api_key: String,

    /// Twitter consumer secret (API secret key)
    pub api_secret: String,

    /// Pre-provisioned bearer token, skips the first credential exchange
    pub bearer_token: Option<String>,

    /// Base URL of the Twitter API
    pub api_url: String,

    /// Path to SQLite database file
    pub db_path: String,

    /// Route prefix accepted by the API dispatcher
    pub api_base_uri: String,

    /// Interval between scheduled fetch cycles
    pub fetch_interval: Duration,

    /// Maximum number of search fields paged concurrently
    pub fetch_concurrency: usize,

    /// Timeout applied to every upstream HTTP call
    pub request_timeout: Duration,

    /// Upper bound on search requests issued per cycle
    pub request_budget: u32,

    /// Transient retries per search page
    pub page_retries: u32,

    /// Run the periodic fetch cycle in the runtime binary
    pub scheduler_enabled: bool,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `TWITTER_API_KEY` (required)
    /// - `TWITTER_API_SECRET` (required)
    /// - `BEARER_TOKEN` (optional)
    /// - `TWITTER_API_URL` (default: https://api.twitter.com)
    /// - `NBA_WS_DB_PATH` (default: nba_ws.db)
    /// - `API_BASE_URI` (default: /todo/api/v1.0)
    /// - `FETCH_INTERVAL_SECS` (default: 7200)
    /// - `FETCH_CONCURRENCY` (default: 4)
    /// - `REQUEST_TIMEOUT_SECS` (default: 10)
    /// - `REQUEST_BUDGET` (default: 150)
    /// - `PAGE_RETRIES` (default: 2)
    /// - `ENABLE_SCHEDULER` (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = required("TWITTER_API_KEY")?;
        let api_secret = required("TWITTER_API_SECRET")?;

        let api_url = env::var("TWITTER_API_URL")
            .unwrap_or_else(|_| "https://api.twitter.com".to_string());
        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "TWITTER_API_URL must start with http:// or https://".to_string(),
            ));
        }

        let fetch_concurrency: usize = parsed("FETCH_CONCURRENCY", 4)?;
        if fetch_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "FETCH_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            api_key,
            api_secret,
            bearer_token: env::var("BEARER_TOKEN").ok().filter(|t| !t.is_empty()),
            api_url: api_url.trim_end_matches('/').to_string(),
            db_path: env::var("NBA_WS_DB_PATH").unwrap_or_else(|_| "nba_ws.db".to_string()),
            api_base_uri: env::var("API_BASE_URI")
                .unwrap_or_else(|_| "/todo/api/v1.0".to_string()),
            fetch_interval: Duration::from_secs(parsed("FETCH_INTERVAL_SECS", 7_200)?),
            fetch_concurrency,
            request_timeout: Duration::from_secs(parsed("REQUEST_TIMEOUT_SECS", 10)?),
            request_budget: parsed("REQUEST_BUDGET", 150)?,
            page_retries: parsed("PAGE_RETRIES", 2)?,
            scheduler_enabled: parsed("ENABLE_SCHEDULER", true)?,
        })
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            concurrency: self.fetch_concurrency,
            request_budget: self.request_budget,
            page_retries: self.page_retries,
        }
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingVariable(name.to_string()))
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .to_lowercase()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{name}={raw}"))),
        Err(_) => Ok(default),
    }
}
