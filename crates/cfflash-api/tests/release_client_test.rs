#![allow(clippy::unwrap_used)]
// Integration tests for `ReleaseClient` using wiremock.

use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cfflash_api::{Error, ReleaseClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ReleaseClient) {
    let server = MockServer::start().await;
    let index_url = Url::parse(&format!("{}/releases", server.uri())).unwrap();
    let client = ReleaseClient::new(index_url, &TransportConfig::default()).unwrap();
    (server, client)
}

// ── Index tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_releases() {
    let (server, client) = setup().await;

    let body = json!([
        {
            "name": "2024.2",
            "tag_name": "2024.2",
            "prerelease": false,
            "assets": [
                {
                    "name": "firmware-cf2-2024.2.zip",
                    "browser_download_url": "http://x/cf2.zip",
                    "size": 1024
                },
                {
                    "name": "firmware-bolt-2024.2.zip",
                    "browser_download_url": "http://x/bolt.zip"
                }
            ],
            "author": { "login": "ignored" }
        },
        { "name": null, "assets": [] }
    ]);

    Mock::given(method("GET"))
        .and(path("/releases"))
        .and(header("accept", "application/vnd.github+json"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let releases = client.list_releases().await.unwrap();

    assert_eq!(releases.len(), 2);
    assert_eq!(releases[0].name.as_deref(), Some("2024.2"));
    assert_eq!(releases[0].assets.len(), 2);
    assert_eq!(releases[0].assets[0].size, Some(1024));
    assert_eq!(releases[0].assets[1].browser_download_url, "http://x/bolt.zip");
    assert!(releases[1].name.is_none());
}

#[tokio::test]
async fn test_token_is_sent_as_bearer() {
    let server = MockServer::start().await;
    let index_url = Url::parse(&format!("{}/releases", server.uri())).unwrap();
    let transport =
        TransportConfig::default().with_token(secrecy::SecretString::from("s3cret".to_string()));
    let client = ReleaseClient::new(index_url, &transport).unwrap();

    Mock::given(method("GET"))
        .and(path("/releases"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let releases = client.list_releases().await.unwrap();
    assert!(releases.is_empty());
}

#[tokio::test]
async fn test_malformed_index_keeps_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/releases"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"message\":\"rate limited\"}"))
        .mount(&server)
        .await;

    match client.list_releases().await {
        Err(Error::Deserialization { body, .. }) => {
            assert!(body.contains("rate limited"), "unexpected body: {body}");
        }
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_http_error_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/releases"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client.list_releases().await.unwrap_err();
    assert!(matches!(err, Error::Http { status: 503, .. }), "got: {err:?}");
    assert!(err.is_transient());
}

// ── Download tests ──────────────────────────────────────────────────

#[tokio::test]
async fn test_download_returns_body_verbatim() {
    let (server, client) = setup().await;
    let payload = vec![0x50, 0x4b, 0x05, 0x06, 0x00, 0xff];

    Mock::given(method("GET"))
        .and(path("/assets/cf2.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .mount(&server)
        .await;

    let body = client
        .download(&format!("{}/assets/cf2.zip", server.uri()))
        .await
        .unwrap();
    assert_eq!(body.as_ref(), payload.as_slice());
}

#[tokio::test]
async fn test_download_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client
        .download(&format!("{}/assets/missing.zip", server.uri()))
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "got: {err:?}");
}

#[tokio::test]
async fn test_download_invalid_url() {
    let (_server, client) = setup().await;
    let err = client.download("not a url").await.unwrap_err();
    assert!(matches!(err, Error::InvalidUrl(_)), "got: {err:?}");
}

#[tokio::test]
async fn test_download_timeout() {
    let server = MockServer::start().await;
    let index_url = Url::parse(&format!("{}/releases", server.uri())).unwrap();
    let transport = TransportConfig::default().with_timeout(Duration::from_millis(100));
    let client = ReleaseClient::new(index_url, &transport).unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = client
        .download(&format!("{}/slow.zip", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }), "got: {err:?}");
}
