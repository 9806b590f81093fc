//! Request pipeline behavior against a mock backend.

mod common;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use catchup_core::api::RequestOptions;
use catchup_core::config::RetryPolicy;
use catchup_core::{ApiError, ErrorKind, FeedClient};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_authenticated_request_sends_bearer_and_json_headers() {
    let server = MockServer::start().await;
    let (client, _) = common::client(&server.uri());
    let token = common::jwt_expiring_in(3_600);
    client.tokens().set_access_token(token.clone()).unwrap();

    Mock::given(method("GET"))
        .and(path("/articles"))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let articles = client.articles().list().await.unwrap();
    assert!(articles.is_empty());
}

#[tokio::test]
async fn test_unauthenticated_requests_omit_authorization() {
    let server = MockServer::start().await;
    let (client, _) = common::client(&server.uri());
    client.tokens().set_access_token("opaque-token").unwrap();

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let _: Value = client
        .api()
        .request("/health", RequestOptions::get().without_auth())
        .await
        .unwrap();
    let _: Value = client.api().get("/health").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].headers.get("authorization").is_none());
    assert_eq!(
        requests[1].headers.get("authorization").unwrap(),
        "Bearer opaque-token"
    );
}

#[tokio::test]
async fn test_header_overrides_replace_defaults() {
    let server = MockServer::start().await;
    let (client, _) = common::client(&server.uri());

    Mock::given(method("GET"))
        .and(path("/export"))
        .and(header("accept", "text/csv"))
        .and(header("x-request-id", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("\"csv\""))
        .expect(1)
        .mount(&server)
        .await;

    let mut headers = HeaderMap::new();
    headers.insert("accept", HeaderValue::from_static("text/csv"));
    headers.insert("x-request-id", HeaderValue::from_static("abc"));
    let body: String = client
        .api()
        .request("/export", RequestOptions::get().headers(headers))
        .await
        .unwrap();
    assert_eq!(body, "csv");
}

#[tokio::test]
async fn test_client_error_is_attempted_once() {
    let server = MockServer::start().await;
    let (client, navigator) = common::client(&server.uri());

    Mock::given(method("POST"))
        .and(path("/sources"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "message": "feed_url is not reachable",
            "details": { "field": "feed_url" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let error = client
        .api()
        .post::<Value, _>("/sources", &json!({ "name": "x" }))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Client);
    assert_eq!(error.status(), Some(400));
    assert_eq!(error.to_string(), "feed_url is not reachable");
    assert_eq!(error.details(), Some(&json!({ "field": "feed_url" })));
    assert!(navigator.paths().is_empty());
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    let (client, _) = common::client(&server.uri());

    Mock::given(method("GET"))
        .and(path("/articles"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(3)
        .mount(&server)
        .await;

    let error = client.api().get::<Value>("/articles").await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Server);
    assert_eq!(error.to_string(), "Request failed with status 503");
}

#[tokio::test]
async fn test_server_error_recovers_on_retry() {
    let server = MockServer::start().await;
    let (client, _) = common::client(&server.uri());

    Mock::given(method("GET"))
        .and(path("/articles"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/articles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let articles: Vec<Value> = client.api().get("/articles").await.unwrap();
    assert!(articles.is_empty());
}

#[tokio::test]
async fn test_disabled_retry_attempts_once() {
    let server = MockServer::start().await;
    let (client, _) = common::client(&server.uri());

    Mock::given(method("GET"))
        .and(path("/articles"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;

    let error = client
        .api()
        .request::<Value>("/articles", RequestOptions::get().no_retry())
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Server);
}

#[tokio::test]
async fn test_unauthorized_clears_tokens_and_navigates_once() {
    let server = MockServer::start().await;
    let (client, navigator) = common::client(&server.uri());
    client.tokens().set_access_token("revoked").unwrap();
    client.tokens().set_refresh_token("refresh").unwrap();

    Mock::given(method("GET"))
        .and(path("/sources"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let error = client.api().get::<Value>("/sources").await.unwrap_err();

    assert!(matches!(error, ApiError::Auth));
    assert_eq!(error.to_string(), "Authentication required");
    assert_eq!(client.tokens().access_token(), None);
    assert_eq!(client.tokens().refresh_token(), None);
    assert_eq!(navigator.paths(), vec!["/login".to_string()]);
}

#[tokio::test]
async fn test_timeout_is_distinct_from_network_failure() {
    let server = MockServer::start().await;
    let (client, _) = common::client(&server.uri());

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let error = client
        .api()
        .request::<Value>(
            "/slow",
            RequestOptions::get()
                .timeout(Duration::from_millis(50))
                .no_retry(),
        )
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Timeout);
    assert!(error.is_retryable());
}

#[tokio::test]
async fn test_timeouts_are_retried_under_policy() {
    let server = MockServer::start().await;
    let (client, _) = common::client(&server.uri());

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(2)
        .mount(&server)
        .await;

    let policy = RetryPolicy {
        max_retries: 1,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 1.0,
    };
    let error = client
        .api()
        .request::<Value>(
            "/slow",
            RequestOptions::get()
                .timeout(Duration::from_millis(50))
                .retry(policy),
        )
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn test_network_errors_retry_with_non_decreasing_delays() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let accepted = Arc::new(Mutex::new(Vec::<Instant>::new()));

    let acceptor = {
        let accepted = Arc::clone(&accepted);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                accepted.lock().unwrap().push(Instant::now());
                let mut buffer = [0_u8; 1024];
                let _ = socket.read(&mut buffer).await;
                // Hang up without a response.
                drop(socket);
            }
        })
    };

    let mut config = common::config(&format!("http://{address}"));
    config.retry = RetryPolicy {
        max_retries: 2,
        initial_delay: Duration::from_millis(40),
        max_delay: Duration::from_secs(1),
        backoff_multiplier: 2.0,
    };
    let (client, _) = common::client_with(config);

    let error = client.api().get::<Value>("/articles").await.unwrap_err();
    acceptor.abort();

    assert_eq!(error.kind(), ErrorKind::Network);
    let accepted = accepted.lock().unwrap().clone();
    assert_eq!(accepted.len(), 3);
    let first_gap = accepted[1] - accepted[0];
    let second_gap = accepted[2] - accepted[1];
    assert!(first_gap >= Duration::from_millis(40));
    assert!(second_gap >= first_gap);
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let address = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let client = FeedClient::builder(common::config(&format!("http://{address}")))
        .build()
        .unwrap();

    let error = client
        .api()
        .request::<Value>("/articles", RequestOptions::get().no_retry())
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Network);
    assert!(error.is_retryable());
}

#[tokio::test]
async fn test_malformed_success_body_is_decode_error() {
    let server = MockServer::start().await;
    let (client, _) = common::client(&server.uri());

    Mock::given(method("GET"))
        .and(path("/articles"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .expect(1)
        .mount(&server)
        .await;

    let error = client.articles().list().await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Decode);
}
