//! Shared fixtures for the integration suites
//!
//! Wiremock helpers that stand in for the cloud-disk REST API and the bot
//! HTTP API, plus builders for clients pointed at them.

#![allow(dead_code)]

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dripfeed::channel::{BotChannel, BotConfig};
use dripfeed::store::{DiskConfig, DiskStore};

pub const DISK_TOKEN: &str = "disk-token";
pub const BOT_TOKEN: &str = "123:abc";

/// A disk client rooted at the mock server, with downloads landing in `dir`.
pub fn disk_store(server: &MockServer, dir: &std::path::Path) -> DiskStore {
    let config = DiskConfig::new(server.uri(), DISK_TOKEN).with_download_dir(dir);
    DiskStore::new(config).unwrap()
}

/// A bot client pointed at the mock server, with a rate limit high enough
/// that tests never wait on it.
pub fn bot_channel(server: &MockServer) -> BotChannel {
    let config = BotConfig::new(server.uri(), BOT_TOKEN).with_sends_per_second(100);
    BotChannel::new(config).unwrap()
}

/// Full disk path for a program-relative one, as the client normalizes it.
pub fn disk_path(relative: &str) -> String {
    format!("disk:/bot/{relative}")
}

fn slug(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// Mount a directory listing for a day folder. Unlisted folders fall through
/// to wiremock's default 404, which the client reads as not-found.
pub async fn mount_listing(server: &MockServer, relative: &str, files: &[&str]) {
    let full = disk_path(relative);
    let items: Vec<Value> = files
        .iter()
        .map(|name| {
            json!({
                "name": name,
                "type": "file",
                "path": format!("{full}/{name}"),
                "size": 1,
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path("/resources"))
        .and(query_param("path", full.as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"_embedded": {"items": items}})),
        )
        .mount(server)
        .await;
}

/// Mount the two-step download for one file: the link endpoint returns an
/// href on the same mock server, and the href serves the bytes.
pub async fn mount_file(server: &MockServer, relative: &str, body: &[u8]) {
    let full = disk_path(relative);
    let content_path = format!("/content/{}", slug(&full));

    Mock::given(method("GET"))
        .and(path("/resources/download"))
        .and(query_param("path", full.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "href": format!("{}{}", server.uri(), content_path),
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(content_path.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Mount a successful bot API method returning the given result payload.
pub async fn mount_bot_method(server: &MockServer, name: &str, result: Value) {
    Mock::given(method("POST"))
        .and(path(format!("/bot{BOT_TOKEN}/{name}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": result,
        })))
        .mount(server)
        .await;
}

/// Mount a failing bot API method with the given status and description.
pub async fn mount_bot_failure(server: &MockServer, name: &str, status: u16, description: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/bot{BOT_TOKEN}/{name}")))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "ok": false,
            "description": description,
        })))
        .mount(server)
        .await;
}
