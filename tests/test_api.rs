//! REST surface: search field CRUD, tweet listing and task control.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use nba_ws::api::{Api, ApiRequest, ApiResponse, Method};
use nba_ws::error::UpstreamError;
use nba_ws::fetch::{Coordinator, FetchSettings};
use nba_ws::store::Database;
use nba_ws::tasks::TaskManager;
use nba_ws::twitter::{PageParams, SearchClient, SearchPage, StaticBearer, TweetRecord};
use serde_json::json;

const BASE: &str = "/todo/api/v1.0";

/// Upstream with no tweets at all.
struct Quiet;

#[async_trait]
impl SearchClient for Quiet {
    async fn search(&self, _token: &str, _params: &PageParams) -> Result<SearchPage, UpstreamError> {
        Ok(SearchPage::default())
    }

    async fn search_quota(&self, _token: &str) -> Result<Option<u32>, UpstreamError> {
        Ok(Some(10))
    }
}

fn setup() -> (Api, Arc<Database>, Arc<TaskManager>) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let coordinator = Arc::new(Coordinator::new(
        db.clone(),
        db.clone(),
        Arc::new(Quiet),
        Arc::new(StaticBearer("T".to_string())),
        FetchSettings::default(),
    ));
    let tasks = Arc::new(TaskManager::new(coordinator));
    (Api::new(db.clone(), tasks.clone(), BASE), db, tasks)
}

fn call(api: &Api, request: ApiRequest) -> ApiResponse {
    api.handle(&request)
}

fn url(path: &str) -> String {
    format!("{BASE}{path}")
}

fn tweet(tweet_id: u64, author: &str) -> TweetRecord {
    TweetRecord {
        tweet_id,
        author: author.to_string(),
        author_id: 1,
        text: format!("tweet {tweet_id}"),
        posted_at: Utc.with_ymd_and_hms(2019, 7, 1, 0, 0, 0).unwrap(),
        raw_payload: json!({"id": tweet_id}).to_string(),
        source_query: json!({"q": format!("from:{author}")}).to_string(),
    }
}

#[tokio::test]
async fn test_create_get_delete_scenario() {
    let (api, _, _) = setup();

    let created = call(
        &api,
        ApiRequest::post(&url("/search"), json!({"search_field": {"q": {"author": "ShamsCharania"}}})),
    );
    assert_eq!(created.status, 201);
    assert_eq!(created.body["search_id"], 1);
    assert_eq!(created.body["uri"], "/todo/api/v1.0/search/1");

    let fetched = call(&api, ApiRequest::get(&url("/search/1")));
    assert_eq!(fetched.status, 200);
    assert_eq!(fetched.body["author"], "ShamsCharania");
    assert_eq!(fetched.body["search_field"], json!({"q": {"author": "ShamsCharania"}}));

    let deleted = call(&api, ApiRequest::delete(&url("/search/1")));
    assert_eq!(deleted.status, 200);

    let gone = call(&api, ApiRequest::get(&url("/search/1")));
    assert_eq!(gone.status, 404);
    assert_eq!(gone.body["message"], "Not found");

    assert_eq!(call(&api, ApiRequest::delete(&url("/search/1"))).status, 404);
}

#[tokio::test]
async fn test_create_validation() {
    let (api, _, _) = setup();

    let cases = [
        json!({}),
        json!({"search_field": {"q": {"filters": "retweets"}}}),
        json!({"search_field": {"q": {"author": ""}}}),
        json!({"search_field": {"q": {"author": "a"}, "count": 0}}),
    ];
    for body in cases {
        let response = call(&api, ApiRequest::post(&url("/search"), body.clone()));
        assert_eq!(response.status, 400, "body {body}");
        assert!(response.body["message"].is_string());
    }

    let body = json!({"search_field": {"q": {"author": "wojespn"}}});
    assert_eq!(call(&api, ApiRequest::post(&url("/search"), body.clone())).status, 201);
    assert_eq!(call(&api, ApiRequest::post(&url("/search"), body)).status, 400);
}

#[tokio::test]
async fn test_list_and_replace() {
    let (api, _, _) = setup();
    for author in ["a", "b"] {
        call(
            &api,
            ApiRequest::post(&url("/search"), json!({"search_field": {"q": {"author": author}}})),
        );
    }

    let listed = call(&api, ApiRequest::get(&url("/search")));
    assert_eq!(listed.status, 200);
    let authors: Vec<_> = listed.body["search_fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["author"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(authors, vec!["b", "a"]);

    let replaced = call(
        &api,
        ApiRequest::put(
            &url("/search/1"),
            json!({"search_field": {"q": {"author": "c", "filters": "retweets"}, "count": 25}}),
        ),
    );
    assert_eq!(replaced.status, 200);
    assert_eq!(replaced.body["author"], "c");
    assert_eq!(replaced.body["search_field"]["count"], 25);

    // Missing search_field or author: 404, like an unknown id.
    assert_eq!(call(&api, ApiRequest::put(&url("/search/1"), json!({}))).status, 404);
    assert_eq!(
        call(&api, ApiRequest::put(&url("/search/1"), json!({"search_field": {"q": {}}}))).status,
        404
    );
    assert_eq!(
        call(&api, ApiRequest::put(&url("/search/99"), json!({"search_field": {"q": {"author": "z"}}}))).status,
        404
    );
    // Taking another spec's author is a validation error.
    assert_eq!(
        call(&api, ApiRequest::put(&url("/search/1"), json!({"search_field": {"q": {"author": "b"}}}))).status,
        400
    );
}

#[tokio::test]
async fn test_tweets_listing() {
    let (api, db, _) = setup();

    let empty = call(&api, ApiRequest::get(&url("/tweets")));
    assert_eq!(empty.status, 200);
    assert_eq!(empty.body, json!({"tweets": []}));

    assert_eq!(call(&api, ApiRequest::get(&url("/tweets?author=nobody"))).status, 404);

    db.insert_tweets(&[tweet(1, "a"), tweet(3, "b"), tweet(2, "c")]).unwrap();

    let all = call(&api, ApiRequest::get(&url("/tweets")));
    let ids: Vec<_> = all.body["tweets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["tweet_id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![3, 2, 1]);

    let filtered = call(&api, ApiRequest::get(&url("/tweets?author=a,c")));
    assert_eq!(filtered.status, 200);
    let tweets = filtered.body["tweets"].as_array().unwrap();
    assert_eq!(tweets.len(), 2);
    assert_eq!(tweets[0]["author"], "c");
    assert_eq!(tweets[0]["search_params"], json!({"q": "from:c"}));
}

#[tokio::test]
async fn test_routing() {
    let (api, _, _) = setup();

    // The base URI is optional.
    assert_eq!(call(&api, ApiRequest::get("/search")).status, 200);
    assert_eq!(call(&api, ApiRequest::get(&url("/search/"))).status, 200);

    assert_eq!(call(&api, ApiRequest::get(&url("/nothing"))).status, 404);
    assert_eq!(call(&api, ApiRequest::get(&url("/search/abc"))).status, 404);
    assert_eq!(call(&api, ApiRequest::new(Method::Post, &url("/tweets"))).status, 405);
    assert_eq!(call(&api, ApiRequest::new(Method::Put, &url("/search"))).status, 405);
    assert_eq!(call(&api, ApiRequest::new(Method::Post, &url("/search/1"))).status, 405);
}

#[tokio::test]
async fn test_trigger_and_task_status() {
    let (api, db, tasks) = setup();
    db.create_spec(&nba_ws::twitter::SearchField::from_value(&json!({"q": {"author": "a"}})).unwrap())
        .unwrap();

    let triggered = call(&api, ApiRequest::get(&url("/search/trigger")));
    assert_eq!(triggered.status, 202);
    let task_id = triggered.body["task_id"].as_str().unwrap().to_string();
    assert_eq!(
        triggered.body["task_status_uri"],
        format!("/todo/api/v1.0/search/taskstatus/{task_id}")
    );

    tasks.wait(&task_id).await.unwrap();

    let status = call(&api, ApiRequest::get(&url(&format!("/search/taskstatus/{task_id}"))));
    assert_eq!(status.status, 200);
    assert_eq!(status.body["state"], "SUCCESS");
    assert_eq!(status.body["ready"], true);
    assert_eq!(status.body["result"]["specs"], 1);
    assert_eq!(status.body["result"]["written"], 0);

    // Cancelling a finished task leaves it untouched.
    let cancelled = call(&api, ApiRequest::delete(&url(&format!("/search/taskstatus/{task_id}"))));
    assert_eq!(cancelled.status, 200);
    assert_eq!(cancelled.body["state"], "SUCCESS");

    assert_eq!(call(&api, ApiRequest::get(&url("/search/taskstatus/unknown"))).status, 404);
}
