//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and exercise the
//! robots.txt check, retry loop, extraction and bulk aggregation end-to-end.

use page_harvest::config::UserAgentConfig;
use page_harvest::crawler::{build_http_client, BulkCrawler, Fetcher, PageFetcher, RetryPolicy};
use page_harvest::observe::{BatchEvent, CrawlObserver, FetchEvent};
use page_harvest::outcome::FailureKind;
use page_harvest::robots::RobotsChecker;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARTICLE_HTML: &str = r#"<html><head><title>Good</title></head><body>
    <nav><a href="/">Home</a> <a href="/about">About us</a></nav>
    <article><h1>Headline</h1><p>Hello</p></article>
    <footer>Copyright footer</footer>
</body></html>"#;

/// Builds a fetcher with a short request timeout and millisecond backoff
fn create_test_fetcher(request_timeout: Duration) -> Fetcher {
    let client = build_http_client(&UserAgentConfig::default(), request_timeout)
        .expect("Failed to build client");
    let robots = RobotsChecker::new(client.clone());

    Fetcher::new(client, robots, "TestBot").with_retry_policy(RetryPolicy::new(
        3,
        Duration::from_millis(1),
        Duration::from_millis(5),
    ))
}

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_missing_robots(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_successful_fetch_extracts_article() {
    let mock_server = MockServer::start().await;
    mount_robots(&mock_server, "User-agent: *\nAllow: /").await;

    Mock::given(method("GET"))
        .and(path("/post"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(ARTICLE_HTML)
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = create_test_fetcher(Duration::from_secs(5));
    let outcome = fetcher
        .fetch_one(&format!("{}/post", mock_server.uri()), 3)
        .await;

    let content = outcome.content().expect("Expected success");
    assert!(content.starts_with("# Headline"), "{}", content);
    assert!(content.ends_with("Hello"), "{}", content);
    assert!(!content.contains("About us"));
    assert!(!content.contains("Copyright"));
}

#[tokio::test]
async fn test_robots_txt_respect() {
    let mock_server = MockServer::start().await;
    mount_robots(&mock_server, "User-agent: *\nDisallow: /private").await;

    // The disallowed page must never be requested
    Mock::given(method("GET"))
        .and(path("/private/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ARTICLE_HTML))
        .expect(0)
        .mount(&mock_server)
        .await;

    let fetcher = create_test_fetcher(Duration::from_secs(5));
    let outcome = fetcher
        .fetch_one(&format!("{}/private/page", mock_server.uri()), 3)
        .await;

    let reason = outcome.reason().expect("Expected a failure");
    assert!(reason.contains("robots.txt"), "{}", reason);
    assert_eq!(outcome.failure_kind(), Some(FailureKind::PolicyBlocked));
}

#[tokio::test]
async fn test_robots_txt_for_other_agent_does_not_block() {
    let mock_server = MockServer::start().await;
    mount_robots(&mock_server, "User-agent: OtherBot\nDisallow: /").await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ARTICLE_HTML))
        .mount(&mock_server)
        .await;

    let fetcher = create_test_fetcher(Duration::from_secs(5));
    let outcome = fetcher
        .fetch_one(&format!("{}/", mock_server.uri()), 3)
        .await;

    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_robots_txt_server_error_allows() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>Open</p>"))
        .mount(&mock_server)
        .await;

    let fetcher = create_test_fetcher(Duration::from_secs(5));
    let outcome = fetcher
        .fetch_one(&format!("{}/page", mock_server.uri()), 3)
        .await;

    assert_eq!(outcome.content(), Some("Open"));
}

#[tokio::test]
async fn test_http_500_exhausts_retries() {
    let mock_server = MockServer::start().await;
    mount_missing_robots(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let fetcher = create_test_fetcher(Duration::from_secs(5));
    let outcome = fetcher
        .fetch_one(&format!("{}/broken", mock_server.uri()), 3)
        .await;

    let reason = outcome.reason().expect("Expected a failure");
    assert!(reason.contains("3 attempts"), "{}", reason);
    assert!(reason.contains("500"), "{}", reason);
    assert_eq!(outcome.failure_kind(), Some(FailureKind::HttpStatusExhausted));
}

#[tokio::test]
async fn test_transient_failure_recovers() {
    let mock_server = MockServer::start().await;
    mount_missing_robots(&mock_server).await;

    // Two failures, then the page comes back
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<main>Back up</main>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = create_test_fetcher(Duration::from_secs(5));
    let outcome = fetcher
        .fetch_one(&format!("{}/flaky", mock_server.uri()), 3)
        .await;

    assert_eq!(outcome.content(), Some("Back up"));
}

#[tokio::test]
async fn test_success_stops_retrying() {
    let mock_server = MockServer::start().await;
    mount_missing_robots(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/once"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>Once</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = create_test_fetcher(Duration::from_secs(5));
    let outcome = fetcher
        .fetch_one(&format!("{}/once", mock_server.uri()), 5)
        .await;

    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_zero_retries_makes_no_request() {
    let mock_server = MockServer::start().await;
    mount_missing_robots(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/never"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let fetcher = create_test_fetcher(Duration::from_secs(5));
    let outcome = fetcher
        .fetch_one(&format!("{}/never", mock_server.uri()), 0)
        .await;

    assert_eq!(outcome.reason(), Some("Maximum retry attempts reached"));
    assert_eq!(outcome.failure_kind(), Some(FailureKind::NoAttempts));
}

#[tokio::test]
async fn test_zero_retries_still_reports_robots_block() {
    let mock_server = MockServer::start().await;
    mount_robots(&mock_server, "User-agent: *\nDisallow: /").await;

    let fetcher = create_test_fetcher(Duration::from_secs(5));
    let outcome = fetcher
        .fetch_one(&format!("{}/page", mock_server.uri()), 0)
        .await;

    assert_eq!(outcome.failure_kind(), Some(FailureKind::PolicyBlocked));
}

#[tokio::test]
async fn test_timeout_reports_network_error() {
    let mock_server = MockServer::start().await;
    mount_missing_robots(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&mock_server)
        .await;

    let fetcher = create_test_fetcher(Duration::from_millis(200));
    let outcome = fetcher
        .fetch_one(&format!("{}/slow", mock_server.uri()), 2)
        .await;

    assert_eq!(
        outcome.reason(),
        Some("Network error after 2 attempts: Request timeout")
    );
    assert_eq!(outcome.failure_kind(), Some(FailureKind::NetworkExhausted));
}

#[tokio::test]
async fn test_connection_refused_reports_network_error() {
    let fetcher = create_test_fetcher(Duration::from_secs(2));

    // Nothing listens on port 1
    let outcome = fetcher.fetch_one("http://127.0.0.1:1/page", 2).await;

    let reason = outcome.reason().expect("Expected a failure");
    assert!(reason.starts_with("Network error after 2 attempts:"), "{}", reason);
}

#[tokio::test]
async fn test_bulk_crawl_mixed_outcomes() {
    // Good site: allows crawling and serves an article
    let good = MockServer::start().await;
    mount_robots(&good, "User-agent: *\nAllow: /").await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ARTICLE_HTML))
        .mount(&good)
        .await;

    // Blocked site: robots.txt disallows everything
    let blocked = MockServer::start().await;
    mount_robots(&blocked, "User-agent: *\nDisallow: /").await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ARTICLE_HTML))
        .expect(0)
        .mount(&blocked)
        .await;

    // Down site: every page request times out
    let down = MockServer::start().await;
    mount_missing_robots(&down).await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .expect(3)
        .mount(&down)
        .await;

    let crawler = BulkCrawler::new(Arc::new(create_test_fetcher(Duration::from_millis(200))));
    let urls = vec![
        format!("{}/", good.uri()),
        format!("{}/", blocked.uri()),
        format!("{}/", down.uri()),
    ];

    let batch = crawler.fetch_all(&urls, Some(3)).await;

    assert!(!batch.overall_success);
    assert_eq!(batch.per_url.len(), 3);
    for (entry, url) in batch.per_url.iter().zip(&urls) {
        assert_eq!(&entry.url, url);
    }

    let good_content = batch.per_url[0].outcome.content().expect("Expected success");
    assert!(good_content.contains("Hello"));
    assert!(!good_content.contains("About us"));

    let blocked_reason = batch.per_url[1].outcome.reason().expect("Expected failure");
    assert!(blocked_reason.contains("robots.txt"));

    let down_reason = batch.per_url[2].outcome.reason().expect("Expected failure");
    assert!(down_reason.contains("Network error"), "{}", down_reason);
    assert!(down_reason.contains("3 attempts"), "{}", down_reason);

    let aggregate = batch.aggregate_error.expect("Expected aggregate error");
    assert!(aggregate.starts_with("Failed to crawl some websites:"));
    assert!(aggregate.contains(&urls[1]));
    assert!(aggregate.contains(&urls[2]));
    assert!(!aggregate.contains(&format!("{}: ", urls[0])));
}

#[tokio::test]
async fn test_malformed_url_in_batch_is_per_url_failure() {
    let mock_server = MockServer::start().await;
    mount_missing_robots(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>Fine</p>"))
        .mount(&mock_server)
        .await;

    let crawler = BulkCrawler::new(Arc::new(create_test_fetcher(Duration::from_secs(5))));
    let urls = vec!["not-a-valid-url".to_string(), format!("{}/ok", mock_server.uri())];

    let batch = crawler.fetch_all(&urls, None).await;

    assert_eq!(batch.per_url.len(), 2);
    let reason = batch.per_url[0].outcome.reason().expect("Expected failure");
    assert!(reason.starts_with("Unexpected error:"), "{}", reason);
    assert_eq!(batch.per_url[1].outcome.content(), Some("Fine"));
}

/// Records every event it receives
#[derive(Default)]
struct RecordingObserver {
    fetches: Mutex<Vec<(String, bool)>>,
    batches: Mutex<Vec<BatchEvent>>,
}

impl CrawlObserver for RecordingObserver {
    fn on_fetch_complete(&self, event: &FetchEvent<'_>) {
        self.fetches
            .lock()
            .unwrap()
            .push((event.url.to_string(), event.success));
    }

    fn on_batch_complete(&self, event: &BatchEvent) {
        self.batches.lock().unwrap().push(event.clone());
    }
}

#[tokio::test]
async fn test_observer_sees_every_fetch_and_batch() {
    let mock_server = MockServer::start().await;
    mount_missing_robots(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>A</p>"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let observer = Arc::new(RecordingObserver::default());
    let fetcher = create_test_fetcher(Duration::from_secs(5)).with_observer(observer.clone());
    let crawler = BulkCrawler::new(Arc::new(fetcher)).with_observer(observer.clone());

    let urls = vec![
        format!("{}/a", mock_server.uri()),
        format!("{}/b", mock_server.uri()),
    ];
    let batch = crawler.fetch_all(&urls, Some(1)).await;
    assert!(!batch.overall_success);

    let mut fetches = observer.fetches.lock().unwrap().clone();
    fetches.sort();
    assert_eq!(
        fetches,
        vec![(urls[0].clone(), true), (urls[1].clone(), false)]
    );

    let batches = observer.batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].url_count, 2);
    assert_eq!(batches[0].success_count, 1);
}
