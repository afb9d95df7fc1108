use super::*;
use crate::tracker::test_helpers::{
    Outcome, StaticSource, create_test_tracker, image_item, post, video_item, wait_for_terminal,
};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;


/// Router over a tracker backed by `outcome`, plus the tracker and its temp dir
async fn test_app(outcome: Outcome) -> (Router, Arc<TaskTracker>, tempfile::TempDir) {
    let (tracker, dir) = create_test_tracker(Arc::new(StaticSource::new(outcome))).await;
    let tracker = Arc::new(tracker);
    let app = create_router(tracker.clone(), tracker.get_config());
    (app, tracker, dir)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn api_server_binds_and_serves() {
    let (tracker, _dir) =
        create_test_tracker(Arc::new(StaticSource::new(Outcome::NotFound))).await;

    let mut config = (*tracker.get_config()).clone();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();

    let handle = tokio::spawn(start_api_server(Arc::new(tracker), Arc::new(config)));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!handle.is_finished(), "server should still be running");
    handle.abort();
}

#[tokio::test]
async fn spawn_api_server_runs_in_background() {
    let (tracker, _dir) =
        create_test_tracker(Arc::new(StaticSource::new(Outcome::NotFound))).await;
    let mut config = (*tracker.get_config()).clone();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let tracker = Arc::new(
        TaskTracker::with_source(config, Arc::new(StaticSource::new(Outcome::NotFound)))
            .await
            .unwrap(),
    );

    let handle = tracker.spawn_api_server();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!handle.is_finished());
    handle.abort();
}

#[tokio::test]
async fn cors_headers_present_when_enabled() {
    let (_app, tracker, _dir) = test_app(Outcome::NotFound).await;
    let mut config = (*tracker.get_config()).clone();
    config.api.cors_enabled = true;
    config.api.cors_origins = vec!["*".to_string()];
    let app = create_router(tracker, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn cors_headers_absent_when_disabled() {
    let (_app, tracker, _dir) = test_app(Outcome::NotFound).await;
    let mut config = (*tracker.get_config()).clone();
    config.api.cors_enabled = false;
    let app = create_router(tracker, Arc::new(config));

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn cors_allows_only_listed_origins() {
    let (_app, tracker, _dir) = test_app(Outcome::NotFound).await;
    let mut config = (*tracker.get_config()).clone();
    config.api.cors_origins = vec!["http://allowed.example".to_string()];
    let app = create_router(tracker, Arc::new(config));

    let allowed = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://allowed.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        allowed.headers()["access-control-allow-origin"],
        "http://allowed.example"
    );

    let denied = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://other.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(
        !denied
            .headers()
            .contains_key("access-control-allow-origin")
    );
}
