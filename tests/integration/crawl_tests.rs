//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run full crawl
//! sessions end-to-end against a SQLite index in a temporary directory.

use std::time::{Duration, Instant};
use tempfile::TempDir;
use truegl::config::{Config, CrawlerConfig, IndexConfig, SearchConfig, UserAgentConfig};
use truegl::index::RunStatus;
use truegl::{SearchEngine, SearchFilters, StopSignal};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration that only allows the mock server's host
fn create_test_config(db_path: &str) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_pages: 50,
            max_depth: 2,
            crawl_delay: 0,
            max_retries: 2,
            timeout: 2000,
            concurrency: 4,
            retry_backoff: 10, // Very short for testing
            allowed_domains: vec!["127.0.0.1".to_string()],
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        index: IndexConfig {
            database_path: db_path.to_string(),
        },
        search: SearchConfig::default(),
    }
}

fn create_test_engine(dir: &TempDir, tweak: impl FnOnce(&mut CrawlerConfig)) -> SearchEngine {
    let db_path = dir.path().join("index.db");
    let mut config = create_test_config(&db_path.to_string_lossy());
    tweak(&mut config.crawler);
    SearchEngine::open(config, "test-hash".to_string()).expect("Failed to open engine")
}

fn html(title: &str, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_bytes(format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            title, body
        ))
}

async fn mount_html(server: &MockServer, at: &str, title: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(html(title, body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(
        &server,
        "/",
        "Home",
        &format!(
            r#"<p>Welcome home</p>
            <a href="{base}/page1">Page 1</a>
            <a href="/page2">Page 2</a>
            <a href="/">Home again</a>
            <a href="https://elsewhere.example.org/">Elsewhere</a>"#
        ),
    )
    .await;
    mount_html(&server, "/page1", "Page 1", "Content one about rivers").await;
    mount_html(&server, "/page2", "Page 2", "Content two about mountains").await;

    let dir = TempDir::new().unwrap();
    let engine = create_test_engine(&dir, |_| {});
    let summary = engine
        .start_crawl(&format!("{}/", base), None)
        .await
        .expect("Crawl failed");

    assert_eq!(summary.pages_fetched, 3);
    assert_eq!(summary.pages_indexed, 3);
    assert_eq!(summary.pages_failed, 0);
    assert_eq!(summary.pages_skipped, 1, "external host is skipped");
    assert_eq!(summary.duplicates_ignored, 1, "self link is a duplicate");
    assert!(!summary.cancelled);

    let stats = engine.get_stats().unwrap();
    assert_eq!(stats.document_count, 3);
    assert_eq!(stats.run_count, 1);
    assert!(stats.last_crawl_time.is_some());

    let page1 = engine
        .document(&format!("{}/page1", base))
        .unwrap()
        .expect("page1 indexed");
    assert_eq!(page1.title, "Page 1");
    assert_eq!(page1.depth, 1);
    assert_eq!(page1.host, "127.0.0.1");
    assert_eq!(page1.truth_score, 0.5);

    let results = engine
        .search("mountains", 1, 10, &SearchFilters::default())
        .unwrap();
    assert_eq!(results.total_matches, 1);
    assert!(results.results[0].url.ends_with("/page2"));

    let runs = engine.recent_runs(5).unwrap();
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(runs[0].config_hash, "test-hash");
}

#[tokio::test]
async fn test_max_pages_caps_indexing_and_counts_leftovers() {
    let server = MockServer::start().await;

    let links: String = (0..10)
        .map(|i| format!(r#"<a href="/child/{}">child {}</a> "#, i, i))
        .collect();
    mount_html(&server, "/", "Hub", &links).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/child/\d+$"))
        .respond_with(html("Child", "A leaf page with text"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let engine = create_test_engine(&dir, |c| {
        c.max_pages = 5;
        c.max_depth = 1;
    });
    let summary = engine
        .start_crawl(&format!("{}/", server.uri()), None)
        .await
        .unwrap();

    assert_eq!(summary.pages_indexed, 5);
    assert_eq!(summary.pages_fetched, 5);
    assert_eq!(summary.pages_skipped, 6);
    assert_eq!(engine.get_stats().unwrap().document_count, 5);

    let run = &engine.recent_runs(1).unwrap()[0];
    assert_eq!(run.pages_indexed, 5);
    assert_eq!(run.pages_skipped, 6);
}

#[tokio::test]
async fn test_max_pages_override() {
    let server = MockServer::start().await;
    let links: String = (0..4)
        .map(|i| format!(r#"<a href="/p{}">p</a>"#, i))
        .collect();
    mount_html(&server, "/", "Hub", &links).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/p\d$"))
        .respond_with(html("Leaf", "leaf"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let engine = create_test_engine(&dir, |_| {});
    let summary = engine
        .start_crawl(&format!("{}/", server.uri()), Some(2))
        .await
        .unwrap();

    assert_eq!(summary.pages_indexed, 2);
    assert_eq!(summary.pages_skipped, 3);
}

#[tokio::test]
async fn test_depth_limit() {
    let server = MockServer::start().await;
    mount_html(&server, "/", "Root", r#"<a href="/one">one</a>"#).await;
    mount_html(&server, "/one", "One", r#"<a href="/two">two</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/two"))
        .respond_with(html("Two", "too deep"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let engine = create_test_engine(&dir, |c| c.max_depth = 1);
    let summary = engine
        .start_crawl(&format!("{}/", server.uri()), None)
        .await
        .unwrap();

    assert_eq!(summary.pages_indexed, 2);
    assert_eq!(summary.pages_skipped, 1);
}

#[tokio::test]
async fn test_retry_then_success() {
    let server = MockServer::start().await;

    // First attempt fails, the retry succeeds
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(html("Flaky", "eventually fine"))
        .with_priority(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let engine = create_test_engine(&dir, |_| {});
    let summary = engine
        .start_crawl(&format!("{}/flaky", server.uri()), None)
        .await
        .unwrap();

    assert_eq!(summary.pages_indexed, 1);
    assert_eq!(summary.pages_failed, 0);
    assert_eq!(summary.retries, 1);
}

#[tokio::test]
async fn test_failure_after_exhausted_retries() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        "Root",
        r#"<a href="/down">down</a> <a href="/fine">fine</a>"#,
    )
    .await;
    mount_html(&server, "/fine", "Fine", "all good").await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3) // one attempt plus max_retries
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let engine = create_test_engine(&dir, |c| c.max_retries = 2);
    let summary = engine
        .start_crawl(&format!("{}/", server.uri()), None)
        .await
        .unwrap();

    assert_eq!(summary.pages_indexed, 2);
    assert_eq!(summary.pages_failed, 1);
    assert_eq!(summary.retries, 2);
    assert!(engine
        .document(&format!("{}/down", server.uri()))
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let engine = create_test_engine(&dir, |_| {});
    let summary = engine
        .start_crawl(&format!("{}/missing", server.uri()), None)
        .await
        .unwrap();

    assert_eq!(summary.pages_failed, 1);
    assert_eq!(summary.pages_fetched, 0);
    assert_eq!(summary.retries, 0);
}

#[tokio::test]
async fn test_rate_limit_honours_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("Home", "rate limited once"))
        .with_priority(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let engine = create_test_engine(&dir, |_| {});
    let started = Instant::now();
    let summary = engine
        .start_crawl(&format!("{}/", server.uri()), None)
        .await
        .unwrap();

    assert_eq!(summary.pages_indexed, 1);
    assert_eq!(summary.retries, 1);
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_extraction_failure_does_not_abort() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        "Root",
        r#"<a href="/bad">bad</a> <a href="/good">good</a>"#,
    )
    .await;
    mount_html(&server, "/good", "Good", "perfectly readable").await;
    mount_html(&server, "/recovered", "Recovered", "found through broken markup").await;

    // Declared UTF-8 but not decodable; its link is still recovered
    let mut bad_body = b"<html><body>\xff\xfe broken ".to_vec();
    bad_body.extend_from_slice(br#"<a href="/recovered">more</a></body></html>"#);
    Mock::given(method("GET"))
        .and(path("/bad"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_bytes(bad_body),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let engine = create_test_engine(&dir, |_| {});
    let summary = engine
        .start_crawl(&format!("{}/", server.uri()), None)
        .await
        .unwrap();

    assert_eq!(summary.pages_fetched, 4);
    assert_eq!(summary.pages_indexed, 3);
    assert_eq!(summary.pages_failed, 1);
    assert!(engine
        .document(&format!("{}/bad", server.uri()))
        .unwrap()
        .is_none());
    assert!(engine
        .document(&format!("{}/recovered", server.uri()))
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_redirected_page_without_title_uses_requested_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/docs/new"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/new"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_bytes(r#"<html><body>moved here <a href="next">next</a></body></html>"#),
        )
        .mount(&server)
        .await;
    mount_html(&server, "/docs/next", "Next", "after the move").await;

    let dir = TempDir::new().unwrap();
    let engine = create_test_engine(&dir, |_| {});
    let summary = engine
        .start_crawl(&format!("{}/old", server.uri()), None)
        .await
        .unwrap();
    assert_eq!(summary.pages_indexed, 2);

    let moved = engine
        .document(&format!("{}/old", server.uri()))
        .unwrap()
        .expect("redirected page indexed under the requested URL");
    assert_eq!(moved.title, format!("{}/old", server.uri()));

    // Relative links resolve against the post-redirect URL
    assert!(engine
        .document(&format!("{}/docs/next", server.uri()))
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_unsupported_content_type_is_not_indexed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/image"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(vec![0x89, 0x50, 0x4e, 0x47]),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let engine = create_test_engine(&dir, |_| {});
    let summary = engine
        .start_crawl(&format!("{}/image", server.uri()), None)
        .await
        .unwrap();

    assert_eq!(summary.pages_fetched, 1);
    assert_eq!(summary.pages_failed, 1);
    assert_eq!(engine.get_stats().unwrap().document_count, 0);
}

#[tokio::test]
async fn test_seed_outside_allow_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("Nope", "never fetched"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let engine = create_test_engine(&dir, |c| {
        c.allowed_domains = vec!["example.org".to_string(), "*.example.org".to_string()];
    });
    let summary = engine
        .start_crawl(&format!("{}/", server.uri()), None)
        .await
        .unwrap();

    assert_eq!(summary.pages_indexed, 0);
    assert_eq!(summary.pages_fetched, 0);
    assert_eq!(summary.pages_skipped, 1);
}

#[tokio::test]
async fn test_invalid_seed_is_a_validation_error() {
    let dir = TempDir::new().unwrap();
    let engine = create_test_engine(&dir, |_| {});
    let err = engine.start_crawl("not a url", None).await.unwrap_err();

    assert!(matches!(err, truegl::TrueglError::Validation(_)));
    assert!(engine.recent_runs(5).unwrap().is_empty());
}

#[tokio::test]
async fn test_same_host_requests_are_spaced() {
    let server = MockServer::start().await;
    mount_html(&server, "/", "Root", r#"<a href="/a">a</a> <a href="/b">b</a>"#).await;
    mount_html(&server, "/a", "A", "a").await;
    mount_html(&server, "/b", "B", "b").await;

    let dir = TempDir::new().unwrap();
    let engine = create_test_engine(&dir, |c| c.crawl_delay = 200);
    let started = Instant::now();
    let summary = engine
        .start_crawl(&format!("{}/", server.uri()), None)
        .await
        .unwrap();

    assert_eq!(summary.pages_indexed, 3);
    // Three fetch starts to one host need at least two delays between them
    assert!(started.elapsed() >= Duration::from_millis(400));
}

#[tokio::test]
async fn test_cancellation_stops_dispatch() {
    let server = MockServer::start().await;
    let links: String = (0..10)
        .map(|i| format!(r#"<a href="/slow/{}">slow</a> "#, i))
        .collect();
    mount_html(&server, "/", "Hub", &links).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/slow/\d+$"))
        .respond_with(html("Slow", "slow page").set_delay(Duration::from_millis(150)))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let engine = create_test_engine(&dir, |c| c.concurrency = 1);
    let stop = StopSignal::new();
    let trigger = stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.stop();
    });

    let summary = engine
        .start_crawl_with_stop(&format!("{}/", server.uri()), None, stop)
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert!(summary.pages_indexed >= 1);
    assert!(summary.pages_indexed < 11);
    assert_eq!(summary.pages_failed, 0);
    assert_eq!(summary.pages_indexed + summary.pages_skipped, 11);
    assert_eq!(engine.recent_runs(1).unwrap()[0].status, RunStatus::Cancelled);
}

#[tokio::test]
async fn test_recrawl_replaces_postings_and_keeps_truth_score() {
    let server = MockServer::start().await;
    mount_html(&server, "/", "Facts", "alpha beta").await;

    let dir = TempDir::new().unwrap();
    let engine = create_test_engine(&dir, |_| {});
    let seed = format!("{}/", server.uri());
    engine.start_crawl(&seed, None).await.unwrap();
    assert!(engine.update_truth_score(&seed, 0.9).unwrap());

    server.reset().await;
    mount_html(&server, "/", "Facts", "gamma delta").await;
    let summary = engine.start_crawl(&seed, None).await.unwrap();
    assert_eq!(summary.pages_indexed, 1);

    let filters = SearchFilters::default();
    assert_eq!(engine.search("alpha", 1, 10, &filters).unwrap().total_matches, 0);

    let results = engine.search("gamma", 1, 10, &filters).unwrap();
    assert_eq!(results.total_matches, 1);
    assert_eq!(results.results[0].truth_score, 0.9);
    assert_eq!(engine.get_stats().unwrap().document_count, 1);
    assert_eq!(engine.get_stats().unwrap().run_count, 2);
}
