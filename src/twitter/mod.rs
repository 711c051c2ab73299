//! Twitter search API access: credentials, query strings, the HTTP client.

pub mod auth;
pub mod client;
pub mod query;
pub mod types;

pub use auth::{BearerSource, CredentialProvider, StaticBearer};
pub use client::{HttpSearchClient, SearchClient};
pub use query::{build as build_query, QueryTerms};
pub use types::{PageParams, RawEnvelope, SearchField, SearchPage, SearchQuery, SearchSpec, TweetRecord};
