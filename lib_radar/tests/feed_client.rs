//! # Feed Client Integration Tests
//!
//! Exercises `GithubFeedClient` over real HTTP against a local `axum` server
//! standing in for the GitHub events endpoint.

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;

use lib_radar::retrieve::{ApiClient, EventFeed, GithubFeedClient};
use lib_radar::{EventRecord, FeedError, FeedFailureCause};

const TOKEN: &str = "ghp_integration_token";

async fn events(headers: HeaderMap) -> (StatusCode, String) {
    let auth = headers.get("authorization").and_then(|v| v.to_str().ok());
    let agent = headers.get("user-agent").and_then(|v| v.to_str().ok());
    if auth != Some("Bearer ghp_integration_token") || agent.is_none() {
        return (StatusCode::UNAUTHORIZED, r#"{"message":"Bad credentials"}"#.to_string());
    }
    (
        StatusCode::OK,
        r#"[{"id":"1","type":"WatchEvent","repo":{"name":"acme/repo"},"public":true}, null]"#.to_string(),
    )
}

async fn spawn_feed() -> SocketAddr {
    let app = Router::new()
        .route("/events", get(events))
        .route("/api/v3/events", get(events))
        .route("/empty", get(|| async { (StatusCode::OK, String::new()) }))
        .route("/null", get(|| async { "null" }))
        .route("/object", get(|| async { r#"{"message":"not a list"}"# }))
        .route("/broken", get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "[]"
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn feed(base: &str, path: &str, token: &str, timeout: Duration) -> GithubFeedClient {
    let client = ApiClient::new(base, Some(token.to_string()), timeout).unwrap();
    GithubFeedClient::new(client, path)
}

#[tokio::test]
async fn fetches_raw_batch_with_bearer_token() {
    let addr = spawn_feed().await;
    let feed = feed(&format!("http://{}", addr), "/events", TOKEN, Duration::from_secs(2));

    let batch = feed.fetch().await.unwrap();

    assert_eq!(batch.len(), 2);
    assert!(batch[1].is_null());
    let record = EventRecord::from_payload(batch[0].clone()).unwrap();
    assert_eq!(record.partition_key(), Ok("acme/repo"));
}

#[tokio::test]
async fn base_url_path_prefix_is_preserved() {
    let addr = spawn_feed().await;
    let feed = feed(&format!("http://{}/api/v3", addr), "events", TOKEN, Duration::from_secs(2));

    assert_eq!(feed.fetch().await.unwrap().len(), 2);
}

#[tokio::test]
async fn rejected_credentials_are_a_client_error_with_body() {
    let addr = spawn_feed().await;
    let feed = feed(&format!("http://{}", addr), "events", "wrong", Duration::from_secs(2));

    match feed.fetch().await {
        Err(FeedError::Unavailable { cause, detail }) => {
            assert_eq!(cause, FeedFailureCause::ClientError(401));
            assert!(detail.contains("Bad credentials"));
        }
        other => panic!("expected client error, got {:?}", other),
    }
}

#[tokio::test]
async fn gateway_failure_is_a_server_error() {
    let addr = spawn_feed().await;
    let feed = feed(&format!("http://{}", addr), "broken", TOKEN, Duration::from_secs(2));

    let err = feed.fetch().await.unwrap_err();
    assert_eq!(err.cause(), Some(FeedFailureCause::ServerError(502)));
}

#[tokio::test]
async fn empty_and_null_bodies_mean_no_events() {
    let addr = spawn_feed().await;

    for path in ["empty", "null"] {
        let feed = feed(&format!("http://{}", addr), path, TOKEN, Duration::from_secs(2));
        assert!(feed.fetch().await.unwrap().is_empty(), "path {}", path);
    }
}

#[tokio::test]
async fn non_array_body_is_malformed() {
    let addr = spawn_feed().await;
    let feed = feed(&format!("http://{}", addr), "object", TOKEN, Duration::from_secs(2));

    assert!(matches!(feed.fetch().await, Err(FeedError::Malformed(_))));
}

#[tokio::test]
async fn slow_feed_times_out() {
    let addr = spawn_feed().await;
    let feed = feed(&format!("http://{}", addr), "slow", TOKEN, Duration::from_millis(200));

    let err = feed.fetch().await.unwrap_err();
    assert_eq!(err.cause(), Some(FeedFailureCause::Timeout));
}

#[tokio::test]
async fn closed_port_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let feed = feed(&format!("http://{}", addr), "events", TOKEN, Duration::from_secs(2));

    let err = feed.fetch().await.unwrap_err();
    assert_eq!(err.cause(), Some(FeedFailureCause::Transport));
}
