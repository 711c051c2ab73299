//! Twitter standard search API client.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::error::UpstreamError;
use crate::twitter::types::{PageParams, SearchPage};

const SEARCH_PATH: &str = "/1.1/search/tweets.json";
const RATE_LIMIT_STATUS_PATH: &str = "/1.1/application/rate_limit_status.json";
/// Characters of an error body kept in [`UpstreamError::Status`]
const ERROR_BODY_CHARS: usize = 200;

/// Upstream search endpoint used by the pager.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Issue one search request with exactly `params`.
    async fn search(&self, token: &str, params: &PageParams) -> Result<SearchPage, UpstreamError>;

    /// Remaining search requests in the current rate-limit window, if reported.
    async fn search_quota(&self, token: &str) -> Result<Option<u32>, UpstreamError>;
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    statuses: Vec<Value>,
}

/// reqwest-backed [`SearchClient`].
#[derive(Debug, Clone)]
pub struct HttpSearchClient {
    client: Client,
    base_url: String,
}

impl HttpSearchClient {
    /// Every request carries `timeout`; expiry maps to [`UpstreamError::Timeout`].
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("nba-ws/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(UpstreamError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn check(response: Response) -> Result<Response, UpstreamError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(UpstreamError::Unauthorized);
        }

        let retry_after = retry_after(response.headers());
        let message = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(ERROR_BODY_CHARS)
            .collect();
        Err(UpstreamError::Status {
            status: status.as_u16(),
            message,
            retry_after,
        })
    }
}

#[async_trait]
impl SearchClient for HttpSearchClient {
    async fn search(&self, token: &str, params: &PageParams) -> Result<SearchPage, UpstreamError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, SEARCH_PATH))
            .bearer_auth(token)
            .query(params)
            .send()
            .await?;

        log::debug!("GET {} -> {}", SEARCH_PATH, response.status());
        let response = Self::check(response).await?;
        let rate_limit_remaining = header_u32(response.headers(), "x-rate-limit-remaining");

        let body: SearchBody = response.json().await?;
        Ok(SearchPage {
            statuses: body.statuses,
            rate_limit_remaining,
        })
    }

    async fn search_quota(&self, token: &str) -> Result<Option<u32>, UpstreamError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, RATE_LIMIT_STATUS_PATH))
            .bearer_auth(token)
            .query(&[("resources", "search")])
            .send()
            .await?;

        let body: Value = Self::check(response).await?.json().await?;
        Ok(body
            .pointer("/resources/search/~1search~1tweets/remaining")
            .and_then(Value::as_u64)
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX)))
    }
}

fn header_u32(headers: &HeaderMap, name: &str) -> Option<u32> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// `retry-after` seconds, else time until `x-rate-limit-reset`.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    if let Some(secs) = headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
    {
        return Some(Duration::from_secs(secs));
    }

    let reset: i64 = headers
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())?;
    let wait = reset.saturating_sub(chrono::Utc::now().timestamp());
    u64::try_from(wait).ok().filter(|secs| *secs > 0).map(Duration::from_secs)
}
