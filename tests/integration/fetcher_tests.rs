//! Integration tests for the HTTP fetcher and its retry policy

use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use villa_sweep::config::Config;
use villa_sweep::crawler::{
    build_http_client, Backoff, FetchError, Fetcher, HttpFetcher, RetryPolicy,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        backoff: Backoff::Fixed(Duration::from_millis(10)),
        rate_limit_multiplier: 3,
        max_delay: Duration::from_millis(100),
    }
}

fn fetcher(config: &Config, policy: RetryPolicy, cancel: CancellationToken) -> HttpFetcher {
    let client = build_http_client(config).expect("Failed to build client");
    HttpFetcher::with_client(client, policy, cancel)
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/listing"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/listing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher(&Config::default(), fast_policy(3), CancellationToken::new());
    let body = fetcher
        .fetch(&format!("{}/listing", mock_server.uri()))
        .await
        .expect("Fetch should succeed after one retry");

    assert_eq!(body, "<html>ok</html>");
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher(&Config::default(), fast_policy(3), CancellationToken::new());
    let result = fetcher.fetch(&format!("{}/gone", mock_server.uri())).await;

    assert_eq!(result, Err(FetchError::HttpStatus(404)));
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(200).set_body_string("done"))
        .mount(&mock_server)
        .await;

    let fetcher = fetcher(&Config::default(), fast_policy(2), CancellationToken::new());
    let start = Instant::now();
    let body = fetcher
        .fetch(&format!("{}/busy", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(body, "done");
    // 10ms backoff stretched by the rate-limit multiplier
    assert!(start.elapsed() >= Duration::from_millis(30));
}

#[tokio::test]
async fn test_retries_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher(&Config::default(), fast_policy(2), CancellationToken::new());
    let result = fetcher.fetch(&format!("{}/flaky", mock_server.uri())).await;

    assert_eq!(result, Err(FetchError::HttpStatus(503)));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let mut config = Config::default();
    config.fetcher.timeout_seconds = 1;

    let fetcher = fetcher(&config, RetryPolicy::no_retries(), CancellationToken::new());
    let result = fetcher.fetch(&format!("{}/slow", mock_server.uri())).await;

    assert_eq!(result, Err(FetchError::Timeout));
}

#[tokio::test]
async fn test_cancellation_interrupts_backoff() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let policy = RetryPolicy {
        backoff: Backoff::Fixed(Duration::from_secs(30)),
        max_delay: Duration::from_secs(30),
        ..fast_policy(5)
    };
    let cancel = CancellationToken::new();
    let fetcher = fetcher(&Config::default(), policy, cancel.clone());

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let result = fetcher.fetch(&format!("{}/down", mock_server.uri())).await;

    assert_eq!(result, Err(FetchError::Cancelled));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_user_agent_identifies_crawler() {
    let mock_server = MockServer::start().await;

    let mut config = Config::default();
    config.user_agent.crawler_name = "TestBot".to_string();
    config.user_agent.crawler_version = "1.0.0".to_string();
    config.user_agent.contact_url = "https://example.com/contact".to_string();
    config.user_agent.contact_email = "test@example.com".to_string();

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header(
            "user-agent",
            "TestBot/1.0.0 (+https://example.com/contact; test@example.com)",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher(&config, RetryPolicy::no_retries(), CancellationToken::new());
    let body = fetcher
        .fetch(&format!("{}/", mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(body, "hello");
}
