//! `/search` handlers: search field CRUD and fetch task control.

use serde_json::{json, Value};

use super::{Api, ApiResponse};
use crate::twitter::types::{SearchField, SearchSpec};

pub(super) fn list(api: &Api) -> ApiResponse {
    match api.db.list_specs() {
        Ok(specs) => {
            let fields: Vec<Value> = specs.iter().map(|spec| represent(api, spec)).collect();
            ApiResponse::ok(json!({ "search_fields": fields }))
        }
        Err(e) => ApiResponse::from_store_error(e),
    }
}

pub(super) fn get(api: &Api, id: i64) -> ApiResponse {
    match api.db.get_spec(id) {
        Ok(spec) => ApiResponse::ok(represent(api, &spec)),
        Err(e) => ApiResponse::from_store_error(e),
    }
}

pub(super) fn create(api: &Api, body: Option<&Value>) -> ApiResponse {
    let Some(raw) = search_field(body) else {
        return ApiResponse::error(400, "'search_field' is a necessary argument");
    };
    let field = match SearchField::from_value(raw) {
        Ok(field) => field,
        Err(e) => return ApiResponse::from_store_error(e),
    };

    match api.db.create_spec(&field) {
        Ok(spec) => ApiResponse::created(represent(api, &spec)),
        Err(e) => ApiResponse::from_store_error(e),
    }
}

/// A body without `search_field` or without an author is answered with 404,
/// the same as an unknown id.
pub(super) fn replace(api: &Api, id: i64, body: Option<&Value>) -> ApiResponse {
    let Some(raw) = search_field(body) else {
        return ApiResponse::error(404, "'search_field' is a necessary argument");
    };
    let has_author = raw
        .pointer("/q/author")
        .and_then(Value::as_str)
        .is_some_and(|author| !author.trim().is_empty());
    if !has_author {
        return ApiResponse::error(404, "'author' is a necessary argument");
    }

    let field = match SearchField::from_value(raw) {
        Ok(field) => field,
        Err(e) => return ApiResponse::from_store_error(e),
    };

    match api.db.replace_spec(id, &field) {
        Ok(spec) => ApiResponse::ok(represent(api, &spec)),
        Err(e) => ApiResponse::from_store_error(e),
    }
}

pub(super) fn delete(api: &Api, id: i64) -> ApiResponse {
    match api.db.delete_spec(id) {
        Ok(()) => ApiResponse::ok(json!({ "result": true })),
        Err(e) => ApiResponse::from_store_error(e),
    }
}

pub(super) fn trigger(api: &Api) -> ApiResponse {
    let task_id = api.tasks.trigger();
    let status_uri = api.uri(&format!("/search/taskstatus/{task_id}"));
    ApiResponse::accepted(json!({
        "task_id": task_id,
        "task_status_uri": status_uri,
    }))
}

pub(super) fn task_status(api: &Api, task_id: &str) -> ApiResponse {
    match api.tasks.status(task_id) {
        Some(status) => ApiResponse::ok(json!(status)),
        None => ApiResponse::not_found(),
    }
}

pub(super) fn cancel_task(api: &Api, task_id: &str) -> ApiResponse {
    match api.tasks.cancel(task_id) {
        Some(status) => ApiResponse::ok(json!(status)),
        None => ApiResponse::not_found(),
    }
}

fn search_field(body: Option<&Value>) -> Option<&Value> {
    body.and_then(|b| b.get("search_field"))
        .filter(|v| !v.is_null())
}

fn represent(api: &Api, spec: &SearchSpec) -> Value {
    json!({
        "search_id": spec.id,
        "search_field": spec.search_field,
        "author": spec.author,
        "created_at": spec.created_at.to_rfc3339(),
        "uri": api.uri(&format!("/search/{}", spec.id)),
    })
}
