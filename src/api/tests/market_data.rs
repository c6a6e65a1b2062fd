use super::*;

#[tokio::test]
async fn market_data_endpoint_returns_stored_bars() {
    let (hub, dir) = create_test_hub(FakeDownloader::default()).await;
    std::fs::create_dir_all(dir.path().join("bars/1h")).unwrap();
    std::fs::write(
        dir.path().join("bars/1h/RELIANCE.csv"),
        "Symbol,Interval,Timestamp,Open,High,Low,Close,Volume\n\
         RELIANCE,1h,2024-01-02 09:15:00,2580.5,2601,2575,2598.35,81000\n",
    )
    .unwrap();

    let (status, body) = send(router_for(&hub), "GET", "/marketdata/RELIANCE/1H", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Fetched 1 records for 1h interval of RELIANCE");

    let bars = body["bars"].as_array().unwrap();
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0]["Symbol"], "RELIANCE");
    assert_eq!(bars[0]["Interval"], "1h");
    assert_eq!(bars[0]["Close"], "2598.35");
    assert_eq!(bars[0]["Volume"], 81000);

    hub.shutdown().await.unwrap();
}

#[tokio::test]
async fn market_data_endpoint_without_file_returns_no_bars() {
    let (hub, _dir) = create_test_hub(FakeDownloader::default()).await;

    let (status, body) = send(router_for(&hub), "GET", "/marketdata/NIFTY/5m", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Fetched 0 records for 5m interval of NIFTY");
    assert_eq!(body["bars"], json!([]));

    hub.shutdown().await.unwrap();
}

#[tokio::test]
async fn market_data_endpoint_rejects_bad_input() {
    let (hub, _dir) = create_test_hub(FakeDownloader::default()).await;

    let (status, body) = send(router_for(&hub), "GET", "/marketdata/NIFTY/7m", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_interval");

    let (status, body) = send(router_for(&hub), "GET", "/marketdata/%20/5m", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");

    let (status, _) = send(router_for(&hub), "GET", "/marketdata/..%2Fsecrets/5m", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    hub.shutdown().await.unwrap();
}
