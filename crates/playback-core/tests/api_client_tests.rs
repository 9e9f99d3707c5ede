//! Integration tests for the metadata HTTP client and SDK initialization
//!
//! Requests go to a canned HTTP/1.1 responder on a local `TcpListener`.

use playback_core::{
    Error, MetadataClient, PlaybackApiClient, PlaybackErrorReason, PlaybackSdk, SdkConfig,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_test::{assert_err, assert_ok};

#[derive(Debug, Clone)]
struct RecordedRequest {
    path: String,
    headers: HashMap<String, String>,
}

struct CannedServer {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl CannedServer {
    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Serve `(path, status, body)` routes; anything else is a bare 404
async fn serve(routes: &[(&str, u16, &str)]) -> CannedServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes: Arc<Vec<(String, u16, String)>> = Arc::new(
        routes
            .iter()
            .map(|(path, status, body)| (path.to_string(), *status, body.to_string()))
            .collect(),
    );
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = requests.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let routes = routes.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        return;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }

                let text = String::from_utf8_lossy(&buf).to_string();
                let mut lines = text.lines();
                let path = lines
                    .next()
                    .and_then(|l| l.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .to_string();
                let headers = lines
                    .take_while(|l| !l.is_empty())
                    .filter_map(|l| l.split_once(':'))
                    .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
                    .collect();
                log.lock().unwrap().push(RecordedRequest {
                    path: path.clone(),
                    headers,
                });

                let (status, body) = routes
                    .iter()
                    .find(|(p, _, _)| *p == path)
                    .map(|(_, s, b)| (*s, b.clone()))
                    .unwrap_or((404, String::new()));
                let response = format!(
                    "HTTP/1.1 {status} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    CannedServer {
        base_url: format!("http://{addr}/v1"),
        requests,
    }
}

const PLAYER_INFO: &str =
    r#"{"player":{"bitmovin":{"license":"lic-123","integrations":{"mux":{"playerName":"Web","envKey":"env-1"}}}}}"#;

const ENTRY: &str = r#"{
    "id": "0_abc",
    "name": "Match highlights",
    "description": "Round 4",
    "media": {"hls": "https://cdn.example.com/0_abc/master.m3u8?ks=sig"},
    "coverImg": {"360": "https://img.example.com/360.jpg", "720": "https://img.example.com/720.jpg"},
    "duration": "180"
}"#;

fn client(server: &CannedServer) -> PlaybackApiClient {
    PlaybackApiClient::new("key-1", &server.base_url, Some("test-agent".into()), Duration::from_secs(5)).unwrap()
}

// =============================================================================
// SDK initialization
// =============================================================================

#[tokio::test]
async fn test_initialize_fetches_license() {
    let server = serve(&[("/v1/player", 200, PLAYER_INFO)]).await;

    let sdk = PlaybackSdk::initialize(SdkConfig::new("key-1").with_base_url(server.base_url.clone()))
        .await
        .unwrap();

    assert_eq!(sdk.license().license_key, "lic-123");
    assert_eq!(sdk.license().analytics_key.as_deref(), Some("env-1"));

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/v1/player");
    assert_eq!(requests[0].headers["x-api-key"], "key-1");
    assert_eq!(requests[0].headers["accept"], "application/json");
    assert!(requests[0].headers["user-agent"].starts_with("playback-sdk-rust/"));
}

#[tokio::test]
async fn test_initialize_without_license() {
    let server = serve(&[("/v1/player", 200, r#"{"player":{"bitmovin":{"license":""}}}"#)]).await;

    let err = PlaybackSdk::initialize(SdkConfig::new("key-1").with_base_url(server.base_url.clone()))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, Error::MissingLicense));
}

#[tokio::test]
async fn test_initialize_rejected_key() {
    let server = serve(&[("/v1/player", 403, "")]).await;

    let err = PlaybackSdk::initialize(SdkConfig::new("bad").with_base_url(server.base_url.clone()))
        .await
        .err()
        .unwrap();

    match err {
        Error::LicenseFetch(message) => assert!(message.contains("API Key not provided or not valid")),
        other => panic!("unexpected error: {other:?}"),
    }
}

// =============================================================================
// Entry resolution
// =============================================================================

#[tokio::test]
async fn test_resolve_entry() {
    let server = serve(&[("/v1/entry/0_abc", 200, ENTRY)]).await;

    let details = client(&server).resolve("0_abc", Some("jwt-1")).await.unwrap();

    assert_eq!(details.id, "0_abc");
    assert_eq!(details.url.as_deref(), Some("https://cdn.example.com/0_abc/master.m3u8?ks=sig"));
    assert_eq!(details.title.as_deref(), Some("Match highlights"));
    assert_eq!(details.thumbnail.as_deref(), Some("https://img.example.com/360.jpg"));

    let request = &server.requests()[0];
    assert_eq!(request.headers["authorization"], "Bearer jwt-1");
    assert_eq!(request.headers["user-agent"], "test-agent");
}

#[tokio::test]
async fn test_resolve_without_token_sends_no_authorization() {
    let server = serve(&[("/v1/entry/0_abc", 200, ENTRY)]).await;

    assert_ok!(client(&server).resolve("0_abc", None).await);

    assert!(!server.requests()[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_resolve_api_error() {
    let server = serve(&[(
        "/v1/entry/0_abc",
        401,
        r#"{"message":"Token expired","reason":"TOKEN_ERROR"}"#,
    )])
    .await;

    let err = client(&server).resolve("0_abc", Some("old")).await.unwrap_err();

    match err {
        Error::Api { status, message, reason } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Token expired");
            assert_eq!(reason, PlaybackErrorReason::TokenError);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_resolve_malformed_body() {
    let server = serve(&[("/v1/entry/0_abc", 200, "<html>oops</html>")]).await;

    let err = assert_err!(client(&server).resolve("0_abc", None).await);

    assert!(matches!(err, Error::MalformedResponse(_)));
}

#[tokio::test]
async fn test_resolve_network_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client =
        PlaybackApiClient::new("key-1", &format!("http://{addr}/v1"), None, Duration::from_secs(2)).unwrap();
    let err = client.resolve("0_abc", None).await.unwrap_err();

    assert!(matches!(err, Error::Network(_)));
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn test_load_all_streams_through_sdk() {
    let server = serve(&[
        ("/v1/player", 200, PLAYER_INFO),
        ("/v1/entry/b", 200, r#"{"media":{"hls":"https://cdn.example.com/b.m3u8"}}"#),
        ("/v1/entry/a", 200, r#"{"media":{"hls":"https://cdn.example.com/a.m3u8"}}"#),
    ])
    .await;
    let sdk = PlaybackSdk::initialize(SdkConfig::new("key-1").with_base_url(server.base_url.clone()))
        .await
        .unwrap();

    let ids: Vec<String> = ["b", "missing", "a"].iter().map(|s| s.to_string()).collect();
    let batch = sdk.load_all_hls_streams(&ids, None).await;

    let resolved: Vec<_> = batch.successes.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(resolved, vec!["b", "a"]);
    assert_eq!(batch.failures.len(), 1);
    match &batch.failures[0].error {
        Error::Api { status, message, .. } => {
            assert_eq!(*status, 404);
            assert_eq!(message, "Failed to get video details");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
