//! `/tweets` handler.

use serde_json::{json, Value};

use super::{Api, ApiRequest, ApiResponse};

/// Authors come from `?author=` (repeatable, comma-separated) and/or a JSON
/// body `{"author": "a"}` / `{"author": ["a", "b"]}`.
pub(super) fn list(api: &Api, request: &ApiRequest) -> ApiResponse {
    let authors = requested_authors(request);

    match api.db.list_tweets(&authors) {
        Ok(tweets) if tweets.is_empty() && !authors.is_empty() => {
            ApiResponse::error(404, format!("No tweets found for {}", authors.join(", ")))
        }
        Ok(tweets) => ApiResponse::ok(json!({ "tweets": tweets })),
        Err(e) => ApiResponse::from_store_error(e),
    }
}

fn requested_authors(request: &ApiRequest) -> Vec<String> {
    let from_body: Vec<&str> = match request.body.as_ref().and_then(|b| b.get("author")) {
        Some(Value::String(author)) => vec![author.as_str()],
        Some(Value::Array(authors)) => authors.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };

    let mut authors: Vec<String> = Vec::new();
    for raw in request.query_values("author").chain(from_body) {
        for author in raw.split(',').map(str::trim).filter(|a| !a.is_empty()) {
            if !authors.iter().any(|known| known == author) {
                authors.push(author.to_string());
            }
        }
    }
    authors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authors_from_query_and_body() {
        let request = ApiRequest::get("/tweets?author=a,b&author=%20c%20&author=")
            .with_body(json!({"author": ["b", "d"]}));
        assert_eq!(requested_authors(&request), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_no_authors() {
        assert!(requested_authors(&ApiRequest::get("/tweets")).is_empty());
        let request = ApiRequest::get("/tweets").with_body(json!({"author": 7}));
        assert!(requested_authors(&request).is_empty());
    }
}
