//! Integration tests for the bot API channel using wiremock

mod common;

use dripfeed::channel::{ChannelError, DeliveryChannel, MediaKind, MediaSource};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn temp_file(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    tokio::fs::write(&path, bytes).await.unwrap();
    path
}

#[tokio::test]
async fn test_send_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendMessage", common::BOT_TOKEN)))
        .and(body_partial_json(json!({"chat_id": 100, "text": "hello"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"message_id": 1},
        })))
        .expect(1)
        .mount(&server)
        .await;

    let channel = common::bot_channel(&server);
    channel.send_text(100, "hello").await.unwrap();
}

#[tokio::test]
async fn test_upload_returns_native_id() {
    let server = MockServer::start().await;
    common::mount_bot_method(&server, "sendDocument", json!({"document": {"file_id": "doc-1"}}))
        .await;

    let dir = TempDir::new().unwrap();
    let file = temp_file(&dir, "notes.pdf", b"%PDF-").await;

    let channel = common::bot_channel(&server);
    let receipt = channel
        .send_media(100, MediaKind::Document, &MediaSource::Upload(file), false)
        .await
        .unwrap();

    assert_eq!(receipt.native_id.as_deref(), Some("doc-1"));
}

#[tokio::test]
async fn test_photo_receipt_keeps_largest_size_id() {
    let server = MockServer::start().await;
    common::mount_bot_method(
        &server,
        "sendPhoto",
        json!({"photo": [{"file_id": "small"}, {"file_id": "large"}]}),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let file = temp_file(&dir, "photo.jpg", b"jpeg").await;

    let channel = common::bot_channel(&server);
    let receipt = channel
        .send_media(100, MediaKind::Photo, &MediaSource::Upload(file), true)
        .await
        .unwrap();

    assert_eq!(receipt.native_id.as_deref(), Some("large"));
}

#[tokio::test]
async fn test_rate_limited_is_transient() {
    let server = MockServer::start().await;
    common::mount_bot_failure(&server, "sendMessage", 429, "Too Many Requests: retry after 3")
        .await;

    let channel = common::bot_channel(&server);
    let err = channel.send_text(100, "hello").await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_rejected_cached_id() {
    let server = MockServer::start().await;
    common::mount_bot_failure(
        &server,
        "sendPhoto",
        400,
        "Bad Request: wrong file identifier/HTTP URL specified",
    )
    .await;

    let channel = common::bot_channel(&server);
    let source = MediaSource::Native("stale-id".to_string());
    let err = channel
        .send_media(100, MediaKind::Photo, &source, true)
        .await
        .unwrap_err();

    assert!(err.is_invalid_identifier());
}

#[tokio::test]
async fn test_html_gateway_error_is_transient() {
    // A proxy in front of the API answers 502 with an HTML page instead of
    // the JSON envelope. That still deserves a retry.
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{}/sendMessage", common::BOT_TOKEN)))
        .respond_with(
            ResponseTemplate::new(502)
                .set_body_string("<html><body><h1>502 Bad Gateway</h1></body></html>"),
        )
        .mount(&server)
        .await;

    let channel = common::bot_channel(&server);
    let err = channel.send_text(100, "hello").await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_bad_request_is_permanent() {
    let server = MockServer::start().await;
    common::mount_bot_failure(&server, "sendMessage", 400, "Bad Request: chat not found").await;

    let channel = common::bot_channel(&server);
    let err = channel.send_text(100, "hello").await.unwrap_err();
    assert!(matches!(err, ChannelError::Permanent(_)));
}
