//! OAuth2 app-only bearer token provider.
//!
//! The token is obtained through a client-credentials exchange and cached in
//! memory for the lifetime of the provider. Readers share the cached token;
//! exchanges are serialized behind a single lock so that concurrent 401s
//! trigger at most one refresh.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::error::AuthError;

/// RFC 1738 encoding applied to consumer key and secret before basic auth.
const CREDENTIAL_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Source of bearer tokens shared by all concurrent pagers.
#[async_trait]
pub trait BearerSource: Send + Sync {
    /// Cached token, or a fresh one from a single exchange.
    async fn acquire(&self) -> Result<String, AuthError>;

    /// Replace `stale` with a fresh token.
    ///
    /// If another task already replaced `stale`, the current token is
    /// returned without a new exchange.
    async fn refresh(&self, stale: &str) -> Result<String, AuthError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token_type: Option<String>,
    access_token: Option<String>,
}

/// Client-credentials bearer token provider.
pub struct CredentialProvider {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    token: RwLock<Option<String>>,
    exchange: Mutex<()>,
}

impl std::fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialProvider")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl CredentialProvider {
    /// Create a provider for the API at `base_url`.
    ///
    /// `seed_token`, when set, is used until it is refreshed or invalidated.
    pub fn new(
        base_url: &str,
        api_key: &str,
        api_secret: &str,
        seed_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: encode_credential(api_key),
            api_secret: encode_credential(api_secret),
            token: RwLock::new(seed_token),
            exchange: Mutex::new(()),
        })
    }

    /// Currently cached token, without triggering an exchange.
    pub async fn cached(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Revoke `token` upstream and drop it from the cache.
    pub async fn invalidate(&self, token: &str) -> Result<(), AuthError> {
        let _exchange = self.exchange.lock().await;

        let response = self
            .client
            .post(format!("{}/oauth2/invalidate_token", self.base_url))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .form(&[("access_token", token)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::Rejected {
                status: response.status().as_u16(),
            });
        }

        let mut cached = self.token.write().await;
        if cached.as_deref() == Some(token) {
            *cached = None;
        }
        log::info!("🔒 Bearer token invalidated");
        Ok(())
    }

    async fn exchange_token(&self) -> Result<String, AuthError> {
        log::debug!("Requesting bearer token from {}/oauth2/token", self.base_url);

        let response = self
            .client
            .post(format!("{}/oauth2/token", self.base_url))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded;charset=UTF-8",
            )
            .body("grant_type=client_credentials")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::Rejected {
                status: response.status().as_u16(),
            });
        }

        let body: TokenResponse = response.json().await?;
        if let Some(kind) = body.token_type.as_deref() {
            if !kind.eq_ignore_ascii_case("bearer") {
                return Err(AuthError::UnexpectedTokenType(kind.to_string()));
            }
        }
        let token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        log::info!("🔑 Obtained new bearer token");
        Ok(token)
    }
}

#[async_trait]
impl BearerSource for CredentialProvider {
    async fn acquire(&self) -> Result<String, AuthError> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }

        let _exchange = self.exchange.lock().await;
        // Another task may have finished an exchange while we waited.
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }

        let token = self.exchange_token().await?;
        *self.token.write().await = Some(token.clone());
        Ok(token)
    }

    async fn refresh(&self, stale: &str) -> Result<String, AuthError> {
        let _exchange = self.exchange.lock().await;

        if let Some(current) = self.token.read().await.clone() {
            if current != stale {
                return Ok(current);
            }
        }

        *self.token.write().await = None;
        let token = self.exchange_token().await?;
        *self.token.write().await = Some(token.clone());
        Ok(token)
    }
}

/// Fixed token, for tests and pre-provisioned deployments.
#[derive(Debug, Clone)]
pub struct StaticBearer(pub String);

#[async_trait]
impl BearerSource for StaticBearer {
    async fn acquire(&self) -> Result<String, AuthError> {
        Ok(self.0.clone())
    }

    async fn refresh(&self, _stale: &str) -> Result<String, AuthError> {
        Ok(self.0.clone())
    }
}

fn encode_credential(raw: &str) -> String {
    utf8_percent_encode(raw, CREDENTIAL_ENCODE_SET).to_string()
}
