//! NBA tweet search service.
//!
//! Stores per-author Twitter search fields, periodically pages the standard
//! search API for tweets newer than what is already stored, and exposes both
//! data sets through a small REST surface.

pub mod api;
pub mod config;
pub mod error;
pub mod fetch;
pub mod service;
pub mod store;
pub mod tasks;
pub mod twitter;

pub use config::AppConfig;
pub use error::{AuthError, ConfigError, CycleError, MalformedRecordError, StoreError, UpstreamError};
pub use service::Service;
