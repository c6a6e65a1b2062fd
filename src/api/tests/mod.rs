use super::*;
use crate::Config;
use crate::services::fakes::{FakeDownloader, Reply};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

mod config;
mod market_data;

/// Started hub backed by `downloader`, storing files in a fresh temp dir
async fn create_test_hub(downloader: FakeDownloader) -> (Arc<MarketDataHub>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.directory = dir.path().to_path_buf();
    config.download.batch_delay_ms = 0;

    let hub = Arc::new(MarketDataHub::with_downloader(config, Arc::new(downloader)).unwrap());
    hub.start().await.unwrap();
    (hub, dir)
}

fn router_for(hub: &Arc<MarketDataHub>) -> Router {
    create_router(Arc::clone(hub), &hub.config().api)
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_ok_and_version() {
    let (hub, _dir) = create_test_hub(FakeDownloader::default()).await;

    let (status, body) = send(router_for(&hub), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    hub.shutdown().await.unwrap();
}

#[tokio::test]
async fn health_reports_shutting_down() {
    let (hub, _dir) = create_test_hub(FakeDownloader::default()).await;
    hub.shutdown().await.unwrap();

    let (status, body) = send(router_for(&hub), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "shutting_down");
}

#[tokio::test]
async fn queue_stats_reflect_running_pool() {
    let (hub, _dir) = create_test_hub(FakeDownloader::default()).await;

    let (status, body) = send(router_for(&hub), "GET", "/queue/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["capacity"], 100);
    assert_eq!(body["pending"], 0);
    assert_eq!(body["free_slots"], 100);
    assert_eq!(body["workers"], 3);
    assert_eq!(body["batch_delay_ms"], 0);
    assert_eq!(body["running"], true);

    hub.shutdown().await.unwrap();
}

#[tokio::test]
async fn openapi_json_is_served() {
    let (hub, _dir) = create_test_hub(FakeDownloader::default()).await;

    let (status, body) = send(router_for(&hub), "GET", "/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/download/contractids"].is_object());

    hub.shutdown().await.unwrap();
}

#[tokio::test]
async fn swagger_ui_can_be_disabled() {
    let (hub, _dir) = create_test_hub(FakeDownloader::default()).await;
    let mut api = hub.config().api.clone();

    let enabled = create_router(Arc::clone(&hub), &api);
    let response = enabled
        .oneshot(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    api.swagger_ui = false;
    let disabled = create_router(Arc::clone(&hub), &api);
    let response = disabled
        .oneshot(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    hub.shutdown().await.unwrap();
}

#[tokio::test]
async fn cors_headers_follow_config() {
    let (hub, _dir) = create_test_hub(FakeDownloader::default()).await;
    let mut api = hub.config().api.clone();

    let request = || {
        Request::builder()
            .uri("/health")
            .header("Origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap()
    };

    let response = create_router(Arc::clone(&hub), &api)
        .oneshot(request())
        .await
        .unwrap();
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );

    api.cors_enabled = false;
    let response = create_router(Arc::clone(&hub), &api)
        .oneshot(request())
        .await
        .unwrap();
    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be absent when CORS is disabled"
    );

    hub.shutdown().await.unwrap();
}

#[test]
fn cors_layer_accepts_specific_origins() {
    // Invalid header values are skipped rather than rejected
    let _layer = build_cors_layer(&["http://localhost:3000".into(), "bad\norigin".into()]);
    let _any = build_cors_layer(&[]);
}

#[tokio::test]
async fn api_server_stops_when_hub_shuts_down() {
    let (hub, _dir) = create_test_hub(FakeDownloader::default()).await;
    let mut api = hub.config().api.clone();
    api.bind_address = "127.0.0.1:0".parse().unwrap();

    let server = tokio::spawn(start_api_server(Arc::clone(&hub), api));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!server.is_finished());

    hub.shutdown().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop after shutdown")
        .unwrap()
        .unwrap();
}
