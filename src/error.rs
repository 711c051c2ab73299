//! Error taxonomy for the fetch pipeline and the stores.
//!
//! Propagation policy:
//! - `AuthError` aborts a whole fetch cycle before any spec is dispatched
//! - `UpstreamError` is isolated to the spec whose page failed
//! - `MalformedRecordError` drops a single record from the batch
//! - `StoreError::NotFound` / `StoreError::Validation` surface as 404 / 400

use std::time::Duration;

use thiserror::Error;

/// Credential exchange failures.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("token exchange rejected with HTTP {status}")]
    Rejected { status: u16 },

    #[error("token endpoint unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token response missing access_token")]
    MissingToken,

    #[error("unexpected token type: {0}")]
    UnexpectedTokenType(String),
}

/// A single search page request failed.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("search API returned HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("search API rejected the bearer token")]
    Unauthorized,

    #[error("search request timed out")]
    Timeout,

    #[error("search request failed: {0}")]
    Http(reqwest::Error),

    #[error("invalid search response: {0}")]
    Decode(String),

    #[error("request budget for this cycle is exhausted")]
    BudgetExhausted,

    #[error("fetch cycle cancelled")]
    Cancelled,

    #[error("bearer token unavailable: {0}")]
    Auth(#[from] AuthError),
}

impl UpstreamError {
    /// Transient failures worth retrying within the same page.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::Http(e) => e.is_connect() || e.is_request(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Server supplied delay for 429 responses.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Http(e)
        }
    }
}

/// One result item could not be normalized into a tweet row.
#[derive(Error, Debug, PartialEq)]
pub enum MalformedRecordError {
    #[error("missing or invalid field `{0}`")]
    MissingField(&'static str),

    #[error("unparseable created_at `{0}`")]
    BadTimestamp(String),

    #[error("tweet id {0} exceeds the storable range")]
    IdOutOfRange(u64),
}

/// Storage layer failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Failure of a whole fetch cycle.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("storage failed: {0}")]
    Store(#[from] StoreError),

    #[error("fetch cycle cancelled")]
    Cancelled,
}

/// Environment configuration problems.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
