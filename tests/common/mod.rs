//! Shared fixtures for repost-dl integration tests
//!
//! A wiremock server stands in for the platform: post JSON under `/p/<code>/`
//! and media bytes under `/cdn/`.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use image::{ImageFormat, Rgb, RgbImage};
use repost_dl::{Config, Task, TaskId, TaskTracker};
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Encode a single-color image
pub fn solid_image(width: u32, height: u32, color: [u8; 3], format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, format).unwrap();
    bytes.into_inner()
}

/// One media node in a mocked post
pub enum Node {
    Image(&'static str),
    Video(&'static str),
}

/// Mount a post whose media live on the same mock server
pub async fn mount_post(
    server: &MockServer,
    code: &str,
    owner: &str,
    caption: &str,
    nodes: &[Node],
) {
    let base = server.uri();
    let children: Vec<serde_json::Value> = nodes
        .iter()
        .map(|node| match node {
            Node::Image(file) => serde_json::json!({"node": {
                "is_video": false,
                "display_url": format!("{base}/cdn/{file}"),
            }}),
            Node::Video(file) => serde_json::json!({"node": {
                "is_video": true,
                "display_url": format!("{base}/cdn/{file}.jpg"),
                "video_url": format!("{base}/cdn/{file}"),
            }}),
        })
        .collect();

    let body = serde_json::json!({
        "graphql": {"shortcode_media": {
            "is_video": false,
            "display_url": format!("{base}/cdn/display.jpg"),
            "owner": {"username": owner},
            "edge_media_to_caption": {"edges": [{"node": {"text": caption}}]},
            "edge_media_preview_like": {"count": 12},
            "edge_media_to_parent_comment": {"count": 3},
            "edge_sidecar_to_children": {"edges": children},
        }}
    });

    Mock::given(method("GET"))
        .and(path(format!("/p/{code}/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Serve `body` at `/cdn/<file>`
pub async fn mount_media(server: &MockServer, file: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(format!("/cdn/{file}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

/// Answer `/p/<code>/` with a bare `status`
pub async fn mount_status(server: &MockServer, code: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/p/{code}/")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Config pointing at the mock platform, rooted in `dir`, with a 100x120 PNG template
pub fn test_config(server: &MockServer, dir: &TempDir) -> Config {
    let template = dir.path().join("template.png");
    std::fs::write(
        &template,
        solid_image(100, 120, [255, 255, 255], ImageFormat::Png),
    )
    .unwrap();

    let mut config = Config::default();
    config.source.base_url = server.uri();
    config.download.download_dir = dir.path().join("downloads");
    config.cover.template_path = template;
    config.cover.width = 60;
    config.cover.height = 80;
    config.cover.pos_x = 20;
    config.cover.pos_y = 20;
    config
}

/// Tracker on the mock platform, with the temp dir that must outlive it
pub async fn create_tracker(server: &MockServer) -> (TaskTracker, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let tracker = TaskTracker::new(test_config(server, &dir)).await.unwrap();
    (tracker, dir)
}

/// Poll until the task finishes
pub async fn wait_for_terminal(tracker: &TaskTracker, id: &TaskId) -> Task {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let task = tracker.status(id).unwrap();
            if task.status.is_terminal() {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("task did not finish in time")
}

/// Sorted file names in a directory
pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
