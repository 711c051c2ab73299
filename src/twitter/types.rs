//! Search field and search page types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::twitter::query::QueryTerms;

/// Query terms of a search field (`search_field.q`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashtag: Option<String>,
}

/// User-defined search criteria, stored serialized in `search_fields.search_field`.
///
/// ```json
/// {"q": {"author": "wojespn", "filters": "retweets"}, "count": 40}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchField {
    pub q: SearchQuery,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

impl SearchField {
    /// Validate an untyped request body value (`search_field`).
    ///
    /// The author must be a non-empty string; `count`, when present, must be a
    /// positive integer.
    pub fn from_value(value: &Value) -> Result<Self, StoreError> {
        let q = value
            .get("q")
            .and_then(Value::as_object)
            .ok_or_else(|| StoreError::Validation("'search_field.q' is required".to_string()))?;

        let author = q
            .get("author")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| StoreError::Validation("'author' is required".to_string()))?;

        let optional = |key: &str| -> Result<Option<String>, StoreError> {
            match q.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) if s.is_empty() => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(StoreError::Validation(format!("'{key}' must be a string"))),
            }
        };

        let count = match value.get("count") {
            None | Some(Value::Null) => None,
            Some(v) => {
                let n = v
                    .as_u64()
                    .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
                    .filter(|n| *n > 0)
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| {
                        StoreError::Validation("'count' must be a positive integer".to_string())
                    })?;
                Some(n)
            }
        };

        Ok(Self {
            q: SearchQuery {
                author: author.to_string(),
                filters: optional("filters")?,
                hashtag: optional("hashtag")?,
            },
            count,
        })
    }

    /// Terms handed to the query builder.
    pub fn terms(&self) -> QueryTerms<'_> {
        QueryTerms {
            author: Some(self.q.author.as_str()),
            filters: self.q.filters.as_deref(),
            hashtag: self.q.hashtag.as_deref(),
        }
    }
}

/// A stored search specification.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpec {
    pub id: i64,
    pub author: String,
    pub search_field: SearchField,
    pub created_at: DateTime<Utc>,
}

/// Exact query parameters sent with one search request.
///
/// Ordered map so the serialized provenance is deterministic.
pub type PageParams = BTreeMap<String, String>;

/// One page returned by the search endpoint.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub statuses: Vec<Value>,
    /// `x-rate-limit-remaining` of the response, when present
    pub rate_limit_remaining: Option<u32>,
}

impl SearchPage {
    /// Tweet ids on this page; items without a numeric id are skipped.
    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.statuses.iter().filter_map(|s| s.get("id").and_then(Value::as_u64))
    }
}

/// One raw search result paired with the parameters that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEnvelope {
    pub status: Value,
    pub params: PageParams,
}

/// Normalized tweet ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct TweetRecord {
    pub tweet_id: u64,
    pub author: String,
    pub author_id: u64,
    pub text: String,
    pub posted_at: DateTime<Utc>,
    /// Status object serialized verbatim
    pub raw_payload: String,
    /// Serialized [`PageParams`] of the request that returned this tweet
    pub source_query: String,
}
