//! REST surface over the stores and the task manager.
//!
//! Transport-agnostic: an HTTP adapter converts its requests into
//! [`ApiRequest`] and writes back the [`ApiResponse`] status and JSON body.
//! No adapter ships with this crate; the `nba_ws` runtime only fetches, and
//! search fields reach it through whatever server mounts [`Api`].
//!
//! Routes (relative to the configured base URI, e.g. `/todo/api/v1.0`):
//! - `GET|POST /search`
//! - `GET|PUT|DELETE /search/{id}`
//! - `GET /search/trigger`
//! - `GET|DELETE /search/taskstatus/{task_id}`
//! - `GET /tweets?author=a,b`

mod search;
mod tweets;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use serde_json::{json, Value};

use crate::error::StoreError;
use crate::store::Database;
use crate::tasks::TaskManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("unsupported method {other}")),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    /// Decoded query parameters in request order; keys may repeat.
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Build a request from a request target such as `/tweets?author=a%20b`.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        Self {
            method,
            path: path.to_string(),
            query: parse_query(query),
            body: None,
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new(Method::Get, target)
    }

    pub fn post(target: &str, body: Value) -> Self {
        Self::new(Method::Post, target).with_body(body)
    }

    pub fn put(target: &str, body: Value) -> Self {
        Self::new(Method::Put, target).with_body(body)
    }

    pub fn delete(target: &str) -> Self {
        Self::new(Method::Delete, target)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Every value of a repeatable query parameter.
    pub fn query_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.query
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn created(body: Value) -> Self {
        Self { status: 201, body }
    }

    pub fn accepted(body: Value) -> Self {
        Self { status: 202, body }
    }

    /// `{"message": ...}` error body.
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "message": message.into() }),
        }
    }

    pub fn not_found() -> Self {
        Self::error(404, StoreError::NotFound.to_string())
    }

    fn method_not_allowed() -> Self {
        Self::error(405, "The method is not allowed for the requested URL.")
    }

    /// Store errors become 404/400; anything else is logged and hidden
    /// behind a generic 500.
    fn from_store_error(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => Self::not_found(),
            StoreError::Validation(message) => Self::error(400, message),
            other => {
                log::error!("❌ Request failed: {}", other);
                Self::error(500, "Internal server error")
            }
        }
    }
}

/// Request dispatcher. Mount it behind an HTTP server by calling
/// [`Api::handle`] once per request; the service builds one as `Service::api`.
pub struct Api {
    db: Arc<Database>,
    tasks: Arc<TaskManager>,
    base_uri: String,
}

impl Api {
    pub fn new(db: Arc<Database>, tasks: Arc<TaskManager>, base_uri: &str) -> Self {
        Self {
            db,
            tasks,
            base_uri: base_uri.trim_end_matches('/').to_string(),
        }
    }

    /// Route and execute one request.
    ///
    /// `GET /search/trigger` spawns a cycle, so this must run inside a tokio
    /// runtime.
    pub fn handle(&self, request: &ApiRequest) -> ApiResponse {
        let path = request
            .path
            .strip_prefix(self.base_uri.as_str())
            .filter(|rest| !self.base_uri.is_empty() && (rest.is_empty() || rest.starts_with('/')))
            .unwrap_or(request.path.as_str());
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let response = match (request.method, segments.as_slice()) {
            (Method::Get, ["search"]) => search::list(self),
            (Method::Post, ["search"]) => search::create(self, request.body.as_ref()),
            (_, ["search"]) => ApiResponse::method_not_allowed(),

            (Method::Get, ["search", "trigger"]) => search::trigger(self),
            (_, ["search", "trigger"]) => ApiResponse::method_not_allowed(),

            (Method::Get, ["search", "taskstatus", task_id]) => search::task_status(self, task_id),
            (Method::Delete, ["search", "taskstatus", task_id]) => search::cancel_task(self, task_id),
            (_, ["search", "taskstatus", _]) => ApiResponse::method_not_allowed(),

            (method, ["search", id]) => match id.parse::<i64>() {
                Ok(id) => match method {
                    Method::Get => search::get(self, id),
                    Method::Put => search::replace(self, id, request.body.as_ref()),
                    Method::Delete => search::delete(self, id),
                    Method::Post => ApiResponse::method_not_allowed(),
                },
                Err(_) => ApiResponse::not_found(),
            },

            (Method::Get, ["tweets"]) => tweets::list(self, request),
            (_, ["tweets"]) => ApiResponse::method_not_allowed(),

            _ => ApiResponse::not_found(),
        };

        log::debug!("{} {} -> {}", request.method, request.path, response.status);
        response
    }

    fn uri(&self, path: &str) -> String {
        format!("{}{}", self.base_uri, path)
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    let decode = |s: &str| percent_decode_str(&s.replace('+', " ")).decode_utf8_lossy().into_owned();
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(k), decode(v))
        })
        .collect()
}
