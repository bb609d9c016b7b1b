//! Terminal-vs-retryable classification in the HTTP fetch layer.

use chrono::NaiveDate;
use seeclickfix_crawler::config::CrawlConfig;
use seeclickfix_crawler::crawler::DateWindow;
use seeclickfix_crawler::fetcher::http::HttpSource;
use seeclickfix_crawler::fetcher::{FetchError, IssueSource};
use serde_json::json;
use std::time::Instant;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn source_for(server: &MockServer, max_retries: u32) -> HttpSource {
    let config = CrawlConfig {
        base_url: server.uri(),
        max_retries,
        // Keep the limiter out of the way so timing assertions only see
        // retry behavior.
        rate_limit_per_minute: 600,
        ..CrawlConfig::default()
    };
    HttpSource::new(&config).unwrap()
}

fn january() -> DateWindow {
    DateWindow::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    )
}

#[tokio::test]
async fn test_client_error_is_terminal_after_one_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/issues/42/comments"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such issue"))
        .expect(1)
        .mount(&server)
        .await;

    let source = source_for(&server, 3);
    let err = source.fetch_comments(42).await.unwrap_err();

    match err {
        FetchError::ClientError { status, url, .. } => {
            assert_eq!(status, 404);
            assert!(url.ends_with("/issues/42/comments"));
        }
        other => panic!("expected ClientError, got {other}"),
    }
}

#[tokio::test]
async fn test_server_error_retries_to_the_ceiling_then_exhausts() {
    let server = MockServer::start().await;
    // max_retries = 1 means exactly two attempts in total.
    Mock::given(method("GET"))
        .and(path("/issues/7/comments"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let source = source_for(&server, 1);
    let err = source.fetch_comments(7).await.unwrap_err();

    match err {
        FetchError::RetriesExhausted { attempts, last, .. } => {
            assert_eq!(attempts, 2);
            assert!(matches!(*last, FetchError::ServerError { status: 500, .. }));
        }
        other => panic!("expected RetriesExhausted, got {other}"),
    }
}

#[tokio::test]
async fn test_rate_limit_hint_is_waited_out_before_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/issues/9/comments"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/issues/9/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"comments": []})))
        .expect(1)
        .mount(&server)
        .await;

    let source = source_for(&server, 3);
    let start = Instant::now();
    let comments = source.fetch_comments(9).await.unwrap();

    assert!(comments.is_empty());
    assert!(
        start.elapsed() >= std::time::Duration::from_secs(1),
        "retry happened before the Retry-After hint elapsed"
    );
}

#[tokio::test]
async fn test_undecodable_body_is_malformed_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/issues"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let source = source_for(&server, 3);
    let err = source.fetch_issues_page(&january(), 1).await.unwrap_err();
    assert!(matches!(err, FetchError::MalformedPayload { .. }));
}

#[tokio::test]
async fn test_single_malformed_record_is_skipped_not_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/issues"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issues": [
                {"id": 1, "summary": "ok"},
                {"id": "not-a-number", "summary": "broken"},
                {"id": 2}
            ],
            "metadata": {"pagination": {"page": 1, "next_page": null}}
        })))
        .mount(&server)
        .await;

    let source = source_for(&server, 3);
    let page = source.fetch_issues_page(&january(), 1).await.unwrap();

    assert_eq!(page.issues.len(), 2);
    assert_eq!(page.skipped, 1);
    assert_eq!(page.info.page, 1);
    assert_eq!(page.info.next_page, None);
}
