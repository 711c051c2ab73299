//! End-to-end fetch cycles against a mocked Twitter API.

use std::sync::Arc;
use std::time::Duration;

use nba_ws::error::CycleError;
use nba_ws::fetch::{Coordinator, FetchSettings};
use nba_ws::store::Database;
use nba_ws::twitter::{CredentialProvider, HttpSearchClient, SearchField};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEARCH: &str = "/1.1/search/tweets.json";

fn tweet(id: u64, author: &str) -> Value {
    json!({
        "id": id,
        "text": format!("{author} tweet {id}"),
        "created_at": "Mon Jul 01 00:01:00 +0000 2019",
        "user": {"id": 7, "screen_name": author}
    })
}

fn statuses(ids: &[u64], author: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_json(json!({"statuses": ids.iter().map(|id| tweet(*id, author)).collect::<Vec<_>>()}))
}

async fn mount_token(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"token_type": "bearer", "access_token": token})),
        )
        .mount(server)
        .await;
}

fn database(authors: &[&str]) -> Arc<Database> {
    let db = Database::open_in_memory().unwrap();
    for author in authors {
        db.create_spec(&SearchField::from_value(&json!({"q": {"author": author}})).unwrap())
            .unwrap();
    }
    Arc::new(db)
}

fn coordinator(server: &MockServer, db: Arc<Database>, seed: Option<&str>) -> Coordinator {
    let credentials = CredentialProvider::new(
        &server.uri(),
        "key",
        "secret",
        seed.map(str::to_string),
        Duration::from_secs(5),
    )
    .unwrap();
    let client = HttpSearchClient::new(&server.uri(), Duration::from_secs(5)).unwrap();

    Coordinator::new(
        db.clone(),
        db,
        Arc::new(client),
        Arc::new(credentials),
        FetchSettings {
            concurrency: 2,
            request_budget: 50,
            page_retries: 0,
        },
    )
}

#[tokio::test]
async fn test_cycle_pages_and_stores_with_provenance() {
    let server = MockServer::start().await;
    mount_token(&server, "AAA").await;
    Mock::given(method("GET"))
        .and(path(SEARCH))
        .and(query_param("max_id", "102"))
        .respond_with(statuses(&[], "wojespn"))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SEARCH))
        .and(header("authorization", "Bearer AAA"))
        .and(query_param("q", "from:wojespn"))
        .respond_with(statuses(&[105, 104, 103], "wojespn"))
        .expect(1)
        .mount(&server)
        .await;

    let db = database(&["wojespn"]);
    let report = coordinator(&server, db.clone(), None)
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.fetched, 3);
    assert_eq!(report.written, 3);
    assert_eq!(db.latest_tweet_id("wojespn").unwrap(), Some(105));

    let stored = db.list_tweets(&["wojespn".to_string()]).unwrap();
    assert_eq!(stored.iter().map(|t| t.tweet_id).collect::<Vec<_>>(), vec![105, 104, 103]);
    assert_eq!(stored[0].search_params, json!({"q": "from:wojespn"}));
    assert_eq!(stored[0].json_data["user"]["screen_name"], "wojespn");
}

#[tokio::test]
async fn test_second_cycle_writes_nothing_new() {
    let server = MockServer::start().await;
    mount_token(&server, "AAA").await;
    // Upstream ignores since_id and keeps returning the same burst.
    Mock::given(method("GET"))
        .and(path(SEARCH))
        .and(query_param("max_id", "102"))
        .respond_with(statuses(&[], "a"))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SEARCH))
        .respond_with(statuses(&[105, 104, 103], "a"))
        .mount(&server)
        .await;

    let db = database(&["a"]);
    let coordinator = coordinator(&server, db.clone(), None);

    let first = coordinator.run_cycle(&CancellationToken::new()).await.unwrap();
    let second = coordinator.run_cycle(&CancellationToken::new()).await.unwrap();

    assert_eq!(first.written, 3);
    assert_eq!(second.written, 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(db.count_tweets().unwrap(), 3);

    // The second cycle resumed from the stored high-water mark.
    let requests = server.received_requests().await.unwrap();
    let last_search = requests
        .iter()
        .rev()
        .find(|r| r.url.path() == SEARCH)
        .unwrap();
    assert!(last_search
        .url
        .query_pairs()
        .any(|(k, v)| k == "since_id" && v == "105"));
}

#[tokio::test]
async fn test_failing_author_does_not_block_siblings() {
    let server = MockServer::start().await;
    mount_token(&server, "AAA").await;
    Mock::given(method("GET"))
        .and(path(SEARCH))
        .and(query_param("q", "from:broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SEARCH))
        .and(query_param("q", "from:healthy"))
        .and(query_param("max_id", "19"))
        .respond_with(statuses(&[], "healthy"))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SEARCH))
        .and(query_param("q", "from:healthy"))
        .respond_with(statuses(&[21, 20], "healthy"))
        .mount(&server)
        .await;

    let db = database(&["broken", "healthy"]);
    let report = coordinator(&server, db.clone(), None)
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.specs, 2);
    assert_eq!(report.failed_specs, 1);
    assert_eq!(report.written, 2);
    assert!(db.list_tweets(&["broken".to_string()]).unwrap().is_empty());
    assert_eq!(db.latest_tweet_id("healthy").unwrap(), Some(21));
}

#[tokio::test]
async fn test_rejected_token_refreshes_and_continues() {
    let server = MockServer::start().await;
    mount_token(&server, "FRESH").await;
    Mock::given(method("GET"))
        .and(path(SEARCH))
        .and(header("authorization", "Bearer STALE"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SEARCH))
        .and(header("authorization", "Bearer FRESH"))
        .respond_with(statuses(&[], "a"))
        .mount(&server)
        .await;

    let db = database(&["a"]);
    let report = coordinator(&server, db, Some("STALE"))
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.failed_specs, 0);
}

#[tokio::test]
async fn test_auth_failure_dispatches_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SEARCH))
        .respond_with(statuses(&[1], "a"))
        .expect(0)
        .mount(&server)
        .await;

    let err = coordinator(&server, database(&["a"]), None)
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CycleError::Auth(_)));
}

#[tokio::test]
async fn test_cancelled_cycle_writes_nothing() {
    let server = MockServer::start().await;
    mount_token(&server, "AAA").await;
    Mock::given(method("GET"))
        .and(path(SEARCH))
        .respond_with(statuses(&[9, 8], "a").set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let db = database(&["a"]);
    let coordinator = coordinator(&server, db.clone(), None);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = coordinator.run_cycle(&cancel).await.unwrap_err();
    assert!(matches!(err, CycleError::Cancelled));
    assert_eq!(db.count_tweets().unwrap(), 0);
}
