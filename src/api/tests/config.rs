use super::*;

#[tokio::test]
async fn get_config_shows_current_download_settings() {
    let (hub, _dir) = create_test_hub(FakeDownloader::default()).await;

    let (status, body) = send(router_for(&hub), "GET", "/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["download"]["max_parallel_workers"], 3);
    assert_eq!(body["download"]["batch_delay_ms"], 0);
    assert_eq!(body["ibkr"]["exchange"], "NSE");

    hub.shutdown().await.unwrap();
}

#[tokio::test]
async fn patch_config_updates_batch_delay() {
    let (hub, _dir) = create_test_hub(FakeDownloader::default()).await;

    let (status, body) = send(
        router_for(&hub),
        "PATCH",
        "/config",
        Some(json!({"batch_delay_ms": 250})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["download"]["batch_delay_ms"], 250);
    assert_eq!(body["download"]["max_queue_size"], 100);
    assert_eq!(hub.settings().batch_delay_ms, 250);

    let (_, stats) = send(router_for(&hub), "GET", "/queue/stats", None).await;
    assert_eq!(stats["batch_delay_ms"], 250);

    hub.shutdown().await.unwrap();
}

#[tokio::test]
async fn patch_config_rejects_invalid_settings() {
    let (hub, _dir) = create_test_hub(FakeDownloader::default()).await;

    let (status, body) = send(
        router_for(&hub),
        "PATCH",
        "/config",
        Some(json!({"max_parallel_workers": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "config_error");
    assert_eq!(hub.settings().max_parallel_workers, 3);

    hub.shutdown().await.unwrap();
}
