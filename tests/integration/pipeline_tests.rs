//! Integration tests for the aggregation pipeline
//!
//! These tests use wiremock to stand in for the YouTube Data API and run
//! whole cycles end-to-end, including the HTTP front door.

use async_trait::async_trait;
use livecam_aggregator::config::{parse_config, Config};
use livecam_aggregator::cycle::{CycleOutcome, CycleRunner, CycleTracker};
use livecam_aggregator::discovery::{
    BackoffPolicy, PageRequest, QueryClient, SearchBackend, UpstreamError, YouTubeBackend,
};
use livecam_aggregator::playlist::PublicationStore;
use livecam_aggregator::resolver::{
    CommandResolver, PoolConfig, ResolveError, ResolverPool, StreamResolver,
};
use livecam_aggregator::server::{self, AppState};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock API
fn create_test_config(api_base_url: &str, extra: &str) -> Config {
    let toml = format!(
        r#"
[search]
query = "live webcam"
excluded-categories = ["Gaming"]
result-cap = 50
page-size = 3

[upstream]
api-base-url = "{}"
api-key = "test-key"
request-timeout-secs = 5
max-retries = 2
initial-backoff-ms = 10
max-backoff-ms = 20

[resolver]
concurrency = 2
max-buffered = 2
timeout-secs = 5

[schedule]
interval-secs = 60

{}
"#,
        api_base_url, extra
    );
    parse_config(&toml).expect("test config should be valid")
}

fn search_body(ids: &[&str], next: Option<&str>) -> serde_json::Value {
    let items: Vec<_> = ids
        .iter()
        .map(|id| {
            json!({
                "id": { "kind": "youtube#video", "videoId": id },
                "snippet": { "title": format!("Search title {}", id), "channelId": "UCsearch" }
            })
        })
        .collect();
    match next {
        Some(token) => json!({ "items": items, "nextPageToken": token }),
        None => json!({ "items": items }),
    }
}

fn videos_body(entries: &[(&str, &str)]) -> serde_json::Value {
    let items: Vec<_> = entries
        .iter()
        .map(|(id, category)| {
            json!({
                "id": id,
                "snippet": {
                    "title": format!("Live cam {}", id),
                    "categoryId": category,
                    "channelId": "UCdetail"
                }
            })
        })
        .collect();
    json!({ "items": items })
}

fn categories_body() -> serde_json::Value {
    json!({
        "items": [
            { "id": "19", "snippet": { "title": "Travel & Events" } },
            { "id": "20", "snippet": { "title": "Gaming" } },
            { "id": "15", "snippet": { "title": "Pets & Animals" } }
        ]
    })
}

fn backend_for(server: &MockServer) -> YouTubeBackend {
    let config = create_test_config(&server.uri(), "");
    YouTubeBackend::from_config(&config.upstream, "test-key".to_string())
        .expect("client should build")
}

async fn mount_categories(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/videoCategories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(categories_body()))
        .mount(server)
        .await;
}

/// Two pages: a, b, g (Gaming) then X, c
async fn mount_two_pages(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("pageToken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&["X", "c"], None)))
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("eventType", "live"))
        .and(query_param("key", "test-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(search_body(&["a", "b", "g"], Some("p2"))),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(videos_body(&[
            ("a", "19"),
            ("b", "15"),
            ("g", "20"),
            ("X", "19"),
            ("c", "19"),
        ])))
        .mount(server)
        .await;
}

/// Resolves every id except the listed ones
struct MapResolver {
    failing: Vec<&'static str>,
}

#[async_trait]
impl StreamResolver for MapResolver {
    async fn resolve(&self, video_id: &str) -> Result<String, ResolveError> {
        if self.failing.contains(&video_id) {
            return Err(ResolveError::NotLive(format!("{} went offline", video_id)));
        }
        Ok(format!("https://cdn.test/{}/index.m3u8", video_id))
    }
}

fn build_runner(config: &Config, resolver: Arc<dyn StreamResolver>) -> CycleRunner {
    let backend = YouTubeBackend::from_config(&config.upstream, "test-key".to_string())
        .expect("client should build");
    let client = QueryClient::new(
        Arc::new(backend),
        BackoffPolicy::from_config(&config.upstream),
    );
    let pool = ResolverPool::new(resolver, PoolConfig::from_config(&config.resolver));
    CycleRunner::new(
        client,
        pool,
        PublicationStore::new(),
        Arc::new(CycleTracker::new()),
        config.profile(),
    )
}

/// Serves the runner's store on an ephemeral port
async fn start_server(runner: &CycleRunner) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = server::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = server::router(AppState {
        store: runner.store().clone(),
        tracker: Arc::clone(runner.tracker()),
        stuck_after: Duration::from_secs(180),
    });

    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(server::serve(listener, app, async {
        let _ = rx.await;
    }));
    (addr, tx)
}

#[tokio::test]
async fn test_search_page_and_video_details() {
    let mock_server = MockServer::start().await;
    mount_two_pages(&mock_server).await;
    let backend = backend_for(&mock_server);

    let page = backend
        .search_page(&PageRequest {
            query: "live webcam".to_string(),
            page_size: 3,
            region_code: None,
            page_token: None,
        })
        .await
        .unwrap();

    assert_eq!(page.next_page_token.as_deref(), Some("p2"));
    let ids: Vec<String> = page.items.iter().map(|i| i.video_id.clone()).collect();
    assert_eq!(ids, vec!["a", "b", "g"]);
    assert_eq!(page.items[0].category_id, "");
    assert_eq!(page.items[0].title, "Search title a");

    let details = backend.video_details(&ids).await.unwrap();
    assert_eq!(details["a"].category_id.as_deref(), Some("19"));
    assert_eq!(details["g"].category_id.as_deref(), Some("20"));
    assert_eq!(details["a"].title, "Live cam a");
    assert_eq!(details["a"].channel_id.as_deref(), Some("UCdetail"));
}

#[tokio::test]
async fn test_search_item_without_details_is_uncategorized() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&["lonely"], None)))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/videos"))
        .and(query_param("id", "lonely"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), "");
    let client = QueryClient::new(
        Arc::new(backend_for(&mock_server)),
        BackoffPolicy::from_config(&config.upstream),
    );

    let candidates = client.discover(&config.profile()).await.unwrap();

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].category_id, "");
    assert_eq!(candidates[0].title, "Search title lonely");
    assert_eq!(candidates[0].channel_id, "UCsearch");
}

#[tokio::test]
async fn test_details_retry_does_not_repeat_search() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body(&["a"], None)))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(videos_body(&[("a", "15")])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), "");
    let client = QueryClient::new(
        Arc::new(backend_for(&mock_server)),
        BackoffPolicy::from_config(&config.upstream),
    );

    let candidates = client.discover(&config.profile()).await.unwrap();

    assert_eq!(candidates[0].category_id, "15");
    let stats = client.stats();
    assert_eq!(stats.retries, 1);
    assert_eq!(stats.requests, 3);
    assert_eq!(stats.quota_units, 102);
}

#[tokio::test]
async fn test_category_listing() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/videoCategories"))
        .and(query_param("regionCode", "US"))
        .respond_with(ResponseTemplate::new(200).set_body_json(categories_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let directory = backend_for(&mock_server).categories(None).await.unwrap();

    assert_eq!(directory.len(), 3);
    assert_eq!(directory.name("20"), Some("Gaming"));
}

#[tokio::test]
async fn test_http_errors_are_classified() {
    let mock_server = MockServer::start().await;
    let quota_body = json!({
        "error": {
            "code": 403,
            "message": "The request cannot be completed because you have exceeded your quota.",
            "errors": [{ "reason": "quotaExceeded", "domain": "youtube.quota" }]
        }
    });
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "quota"))
        .respond_with(ResponseTemplate::new(403).set_body_json(quota_body))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "busy"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "garbage"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&mock_server)
        .await;

    let backend = backend_for(&mock_server);
    let request = |q: &str| PageRequest {
        query: q.to_string(),
        page_size: 5,
        region_code: None,
        page_token: None,
    };

    let quota = backend.search_page(&request("quota")).await.unwrap_err();
    assert!(matches!(quota, UpstreamError::QuotaExhausted(_)));
    assert!(!quota.is_transient());

    let busy = backend.search_page(&request("busy")).await.unwrap_err();
    assert!(matches!(busy, UpstreamError::Server { status: 503, .. }));
    assert!(busy.is_transient());

    let garbage = backend.search_page(&request("garbage")).await.unwrap_err();
    assert!(matches!(garbage, UpstreamError::Malformed(_)));
}

#[tokio::test]
async fn test_full_cycle_serves_playlist() {
    let mock_server = MockServer::start().await;
    mount_categories(&mock_server).await;
    mount_two_pages(&mock_server).await;

    let config = create_test_config(&mock_server.uri(), "");
    let runner = build_runner(&config, Arc::new(MapResolver { failing: vec!["X"] }));
    let (addr, stop) = start_server(&runner).await;

    let before = reqwest::get(format!("http://{}/playlist", addr)).await.unwrap();
    assert_eq!(before.status(), 503);

    let stats = runner.run_cycle().await;

    assert_eq!(stats.outcome, CycleOutcome::Published { entries: 3 });
    assert_eq!(stats.candidates_found, 5);
    assert_eq!(stats.candidates_excluded, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.upstream.pages, 2);

    let response = reqwest::get(format!("http://{}/playlist", addr)).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "application/vnd.apple.mpegurl"
    );
    assert!(response.headers().contains_key("x-playlist-generated-at"));
    let body = response.text().await.unwrap();
    assert_eq!(
        body,
        "#EXTM3U\n\
         #EXTINF:-1 group-title=\"Pets & Animals\",Live cam b\n\
         https://cdn.test/b/index.m3u8\n\
         #EXTINF:-1 group-title=\"Travel & Events\",Live cam a\n\
         https://cdn.test/a/index.m3u8\n\
         #EXTINF:-1 group-title=\"Travel & Events\",Live cam c\n\
         https://cdn.test/c/index.m3u8\n"
    );

    let health = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
    assert_eq!(health.status(), 200);
    let json: serde_json::Value = health.json().await.unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["cycles_published"], 1);

    let missing = reqwest::get(format!("http://{}/refresh", addr)).await.unwrap();
    assert_eq!(missing.status(), 404);

    let _ = stop.send(());
}

#[tokio::test]
async fn test_retries_exhausted_keeps_serving_unavailable() {
    let mock_server = MockServer::start().await;
    mount_categories(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), "");
    let runner = build_runner(&config, Arc::new(MapResolver { failing: vec![] }));
    let (addr, stop) = start_server(&runner).await;

    let stats = runner.run_cycle().await;

    assert!(stats.outcome.is_aborted());
    assert_eq!(stats.upstream.retries, 2);
    assert!(runner.store().get().is_none());

    let playlist = reqwest::get(format!("http://{}/playlist", addr)).await.unwrap();
    assert_eq!(playlist.status(), 503);
    let health = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
    assert_eq!(health.status(), 200);

    let _ = stop.send(());
}

#[tokio::test]
async fn test_unauthorized_aborts_without_retry() {
    let mock_server = MockServer::start().await;
    mount_categories(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "code": 401, "message": "API key not valid", "errors": [] }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), "");
    let runner = build_runner(&config, Arc::new(MapResolver { failing: vec![] }));

    let stats = runner.run_cycle().await;

    match stats.outcome {
        CycleOutcome::Aborted { reason } => assert!(reason.contains("API key not valid")),
        other => panic!("expected abort, got {:?}", other),
    }
    assert_eq!(stats.upstream.retries, 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_cycle_with_command_resolver_writes_playlist_file() {
    let mock_server = MockServer::start().await;
    mount_categories(&mock_server).await;
    mount_two_pages(&mock_server).await;

    let dir = tempfile::TempDir::new().unwrap();
    let playlist_path = dir.path().join("playlist.m3u8");
    let config = create_test_config(
        &mock_server.uri(),
        &format!(
            "[output]\nplaylist-path = \"{}\"\n",
            playlist_path.display()
        ),
    );

    // The id "X" exits non-zero with a live-event style message
    let resolver = CommandResolver::new(
        "sh",
        vec![
            "-c".to_string(),
            r#"if [ "$0" = "X" ]; then echo "ERROR: This live event will begin in 3 hours" >&2; exit 1; fi; echo "https://cdn.test/$0/best.m3u8""#.to_string(),
            "{id}".to_string(),
        ],
        "https://www.youtube.com/watch?v={id}",
        Duration::from_secs(5),
    );
    let runner = build_runner(&config, Arc::new(resolver))
        .with_playlist_path(config.output.playlist_path.as_ref().map(Into::into));

    let stats = runner.run_cycle().await;

    assert_eq!(stats.outcome, CycleOutcome::Published { entries: 3 });
    assert_eq!(stats.failed, 1);
    let written = std::fs::read_to_string(&playlist_path).unwrap();
    assert!(written.starts_with("#EXTM3U\n"));
    assert!(written.contains("https://cdn.test/a/best.m3u8\n"));
    assert!(!written.contains("/X/"));
    assert_eq!(written, runner.store().get().unwrap().text);
}
