#![allow(clippy::unwrap_used)]
// Integration tests for `ReleaseCache` against a wiremock release server.

use std::io::{Cursor, Write};
use std::time::Duration;

use serde_json::json;
use tokio::runtime::Handle;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cfflash_api::{ReleaseClient, TransportConfig};
use cfflash_core::{
    CACHE_FILE_NAME, CoreError, ReleaseCache, ReleaseCatalog, ReleaseSettings, check_archive,
};

// ── Helpers ─────────────────────────────────────────────────────────

struct Setup {
    server: MockServer,
    cache: ReleaseCache,
    _dir: tempfile::TempDir,
}

async fn setup() -> Setup {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let index_url = Url::parse(&format!("{}/releases", server.uri())).unwrap();
    let client = ReleaseClient::new(index_url, &TransportConfig::default()).unwrap();
    let cache = ReleaseCache::new(client, Some(dir.path()), Handle::current()).unwrap();
    Setup {
        server,
        cache,
        _dir: dir,
    }
}

fn firmware_zip(payload: &[u8]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    writer.start_file("manifest.json", options).unwrap();
    writer.write_all(br#"{"version":1}"#).unwrap();
    writer.start_file("cf2-stm32.bin", options).unwrap();
    writer.write_all(payload).unwrap();
    writer.finish().unwrap().into_inner()
}

async fn mount_zip(server: &MockServer, route: &str, body: Vec<u8>, expected: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .expect(expected)
        .mount(server)
        .await;
}

// ── Release index ───────────────────────────────────────────────────

#[tokio::test]
async fn test_list_single_release() {
    let s = setup().await;
    Mock::given(method("GET"))
        .and(path("/releases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "1.0", "assets": [{"name": "cf2", "browser_download_url": "http://x/cf2.zip"}]}
        ])))
        .mount(&s.server)
        .await;

    let entries = s.cache.fetch_releases().await.unwrap();
    assert_eq!(entries.len(), 1);

    let catalog = ReleaseCatalog::from_entries(&entries);
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.url("1.0 - cf2"), Some("http://x/cf2.zip"));
}

#[tokio::test]
async fn test_list_skips_unnamed_and_keeps_order() {
    let s = setup().await;
    Mock::given(method("GET"))
        .and(path("/releases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "2024.2", "assets": [
                {"name": "cf2", "browser_download_url": "http://x/2/cf2.zip"},
                {"name": "bolt", "browser_download_url": "http://x/2/bolt.zip"}
            ]},
            {"name": "", "assets": [{"name": "a", "browser_download_url": "http://x/a.zip"}]},
            {"assets": []},
            {"name": "2023.11", "assets": [{"name": "cf2", "browser_download_url": "http://x/1/cf2.zip"}]}
        ])))
        .mount(&s.server)
        .await;

    let entries = s.cache.fetch_releases().await.unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["2024.2", "2023.11"]);
    assert_eq!(entries[0].assets[1].name, "bolt");
}

#[tokio::test]
async fn test_list_callback_receives_transport_error() {
    let s = setup().await;
    Mock::given(method("GET"))
        .and(path("/releases"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&s.server)
        .await;

    let (tx, rx) = tokio::sync::oneshot::channel();
    s.cache.list_releases(move |result| {
        let _ = tx.send(result);
    });

    let err = rx.await.unwrap().unwrap_err();
    assert!(
        matches!(err, CoreError::Api { status: Some(503), .. }),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_list_unreachable_server() {
    let dir = tempfile::tempdir().unwrap();
    let settings = ReleaseSettings {
        timeout: Duration::from_secs(2),
        cache_parent: Some(dir.path().to_path_buf()),
        ..ReleaseSettings::with_index_url(Url::parse("http://127.0.0.1:1/releases").unwrap())
    };
    let cache = ReleaseCache::from_settings(&settings, Handle::current()).unwrap();

    let err = cache.fetch_releases().await.unwrap_err();
    assert!(
        matches!(err, CoreError::ConnectionFailed { .. }),
        "unexpected error: {err:?}"
    );
}

// ── Download slot ───────────────────────────────────────────────────

#[tokio::test]
async fn test_download_stores_archive() {
    let s = setup().await;
    let body = firmware_zip(b"stm32 image");
    mount_zip(&s.server, "/cf2.zip", body.clone(), 1).await;

    let url = format!("{}/cf2.zip", s.server.uri());
    let artifact = s.cache.download("2024.2 - cf2", &url).await.unwrap();

    assert!(!artifact.reused);
    assert_eq!(artifact.path, s.cache.path());
    assert!(artifact.path.ends_with(CACHE_FILE_NAME));
    assert_eq!(std::fs::read(&artifact.path).unwrap(), body);
    assert_eq!(
        s.cache.cached_release().await.as_deref(),
        Some("2024.2 - cf2")
    );
}

#[tokio::test]
async fn test_same_url_is_fetched_once() {
    let s = setup().await;
    mount_zip(&s.server, "/cf2.zip", firmware_zip(b"image"), 1).await;

    let url = format!("{}/cf2.zip", s.server.uri());
    let first = s.cache.download("2024.2 - cf2", &url).await.unwrap();
    let second = s.cache.download("2024.2 - cf2", &url).await.unwrap();

    assert!(!first.reused);
    assert!(second.reused);
    assert_eq!(first.path, second.path);
    // `expect(1)` is verified when the server drops.
}

#[tokio::test]
async fn test_background_download_reports_through_callback() {
    let s = setup().await;
    mount_zip(&s.server, "/cf2.zip", firmware_zip(b"image"), 1).await;

    let url = format!("{}/cf2.zip", s.server.uri());
    let (tx, rx) = tokio::sync::oneshot::channel();
    s.cache.download_release("2024.2 - cf2", &url, move |result| {
        let _ = tx.send(result);
    });

    let artifact = rx.await.unwrap().unwrap();
    assert_eq!(artifact.release, "2024.2 - cf2");
    assert_eq!(artifact.url, url);
}

#[tokio::test]
async fn test_different_url_replaces_slot() {
    let s = setup().await;
    mount_zip(&s.server, "/cf2.zip", firmware_zip(b"cf2"), 1).await;
    mount_zip(&s.server, "/bolt.zip", firmware_zip(b"bolt"), 1).await;

    let cf2 = format!("{}/cf2.zip", s.server.uri());
    let bolt = format!("{}/bolt.zip", s.server.uri());
    s.cache.download("2024.2 - cf2", &cf2).await.unwrap();
    let artifact = s.cache.download("2024.2 - bolt", &bolt).await.unwrap();

    assert!(!artifact.reused);
    assert_eq!(
        s.cache.cached_release().await.as_deref(),
        Some("2024.2 - bolt")
    );
}

#[tokio::test]
async fn test_corrupted_cache_is_refetched() {
    let s = setup().await;
    mount_zip(&s.server, "/cf2.zip", firmware_zip(b"image"), 2).await;

    let url = format!("{}/cf2.zip", s.server.uri());
    s.cache.download("2024.2 - cf2", &url).await.unwrap();

    std::fs::write(s.cache.path(), b"not a zip archive").unwrap();
    assert!(check_archive(&s.cache.path()).is_err());

    let artifact = s.cache.download("2024.2 - cf2", &url).await.unwrap();
    assert!(!artifact.reused);
    check_archive(&artifact.path).unwrap();
}

#[tokio::test]
async fn test_invalid_download_is_rejected() {
    let s = setup().await;
    Mock::given(method("GET"))
        .and(path("/broken.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<html>rate limited</html>".to_vec()))
        .mount(&s.server)
        .await;

    let url = format!("{}/broken.zip", s.server.uri());
    let err = s.cache.download("broken", &url).await.unwrap_err();

    assert!(
        matches!(err, CoreError::InvalidArtifact { .. }),
        "unexpected error: {err:?}"
    );
    assert!(!s.cache.path().exists());
    assert!(!s.cache.partial_path().exists());
    assert!(s.cache.cached_release().await.is_none());
}

#[tokio::test]
async fn test_download_not_found() {
    let s = setup().await;
    Mock::given(method("GET"))
        .and(path("/gone.zip"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&s.server)
        .await;

    let url = format!("{}/gone.zip", s.server.uri());
    let err = s.cache.download("gone", &url).await.unwrap_err();
    assert!(
        matches!(err, CoreError::Api { status: Some(404), .. }),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_invalidate_forces_refetch() {
    let s = setup().await;
    mount_zip(&s.server, "/cf2.zip", firmware_zip(b"image"), 2).await;

    let url = format!("{}/cf2.zip", s.server.uri());
    s.cache.download("2024.2 - cf2", &url).await.unwrap();

    s.cache.invalidate().await.unwrap();
    assert!(!s.cache.path().exists());
    assert!(s.cache.cached_release().await.is_none());

    let artifact = s.cache.download("2024.2 - cf2", &url).await.unwrap();
    assert!(!artifact.reused);

    // Invalidating an empty slot is fine.
    s.cache.invalidate().await.unwrap();
    s.cache.invalidate().await.unwrap();
}

#[tokio::test]
async fn test_invalidate_removes_unfinished_download() {
    let s = setup().await;
    std::fs::write(s.cache.partial_path(), b"half an archive").unwrap();

    s.cache.invalidate().await.unwrap();
    assert!(!s.cache.partial_path().exists());
}

#[tokio::test]
async fn test_write_failure_reports_io_error() {
    let s = setup().await;
    mount_zip(&s.server, "/cf2.zip", firmware_zip(b"image"), 1).await;
    std::fs::remove_dir_all(s.cache.path().parent().unwrap()).unwrap();

    let url = format!("{}/cf2.zip", s.server.uri());
    let err = s.cache.download("2024.2 - cf2", &url).await.unwrap_err();
    assert!(matches!(err, CoreError::Io(_)), "unexpected error: {err:?}");
    assert!(!s.cache.partial_path().exists());
    assert!(s.cache.cached_release().await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_downloads_share_one_fetch() {
    let s = setup().await;
    Mock::given(method("GET"))
        .and(path("/cf2.zip"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(firmware_zip(b"image"))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&s.server)
        .await;

    let url = format!("{}/cf2.zip", s.server.uri());
    let (a, b) = tokio::join!(
        s.cache.download("2024.2 - cf2", &url),
        s.cache.download("2024.2 - cf2", &url)
    );

    let reused = [a.unwrap().reused, b.unwrap().reused];
    assert_eq!(reused.iter().filter(|r| **r).count(), 1);
}
