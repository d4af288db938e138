//! End-to-end spool -> uploader integration tests (spec §8 scenarios 2-3).
//!
//! Drives a real `Uploader` against a real (local, ephemeral) HTTP server
//! via `wiremock`, and a real SQLite-backed `Spool` in a temp directory —
//! no mocking of the spool or uploader internals themselves.

use std::time::Duration;
use telemetry_common::Sample;
use telemetry_edge::spool::Spool;
use telemetry_edge::uploader::Uploader;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sample(n: u32) -> Sample {
    Sample {
        device_id: "inv-01".to_string(),
        ts: chrono::Utc::now(),
        pv_power_w: n as f64,
        pv_daily_kwh: None,
        battery_power_w: 0.0,
        battery_soc_pct: 50.0,
        battery_temp_c: None,
        load_power_w: 0.0,
        export_power_w: 0.0,
        sample_count: 1,
    }
}

async fn spool_in(dir: &tempfile::TempDir) -> Spool {
    let path = dir.path().join("spool.db");
    Spool::open(path.to_str().unwrap()).await.unwrap()
}

#[tokio::test]
async fn successful_upload_acks_and_drains_one_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/ingest"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"inserted": 5})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let spool = spool_in(&dir).await;
    for i in 0..5 {
        spool.enqueue(&sample(i)).await.unwrap();
    }
    assert_eq!(spool.count().await.unwrap(), 5);

    let mut uploader = Uploader::new(
        server.uri(),
        "secret-token".to_string(),
        30,
        Duration::from_secs(5),
        Duration::from_secs(60),
    )
    .unwrap();

    uploader.upload_once(&spool).await.unwrap();
    assert_eq!(spool.count().await.unwrap(), 0);
}

#[tokio::test]
async fn failed_upload_leaves_spool_untouched_and_retries_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/ingest"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/ingest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"inserted": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let spool = spool_in(&dir).await;
    spool.enqueue(&sample(1)).await.unwrap();

    let mut uploader = Uploader::new(
        server.uri(),
        "secret-token".to_string(),
        30,
        Duration::from_secs(5),
        // Keep the test fast: cap the backoff well below its default.
        Duration::from_millis(50),
    )
    .unwrap();

    // First cycle: server rejects, nothing is acked, row stays at the head.
    uploader.upload_once(&spool).await.unwrap();
    assert_eq!(spool.count().await.unwrap(), 1);

    // Second cycle: same row is re-peeked (never dropped or reordered)
    // and now succeeds.
    uploader.upload_once(&spool).await.unwrap();
    assert_eq!(spool.count().await.unwrap(), 0);
}

#[tokio::test]
async fn outage_then_recovery_drains_in_batch_size_chunks() {
    // Scenario 3 (spec §8): 60 rows accumulate while the server is down;
    // once it's back, two cycles of batch_size=30 drain the backlog.
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/ingest"))
        .respond_with(|req: &wiremock::Request| {
            let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
            let n = body["samples"].as_array().map_or(0, |a| a.len());
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"inserted": n}))
        })
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let spool = spool_in(&dir).await;
    for i in 0..60u32 {
        spool.enqueue(&sample(i)).await.unwrap();
    }
    assert_eq!(spool.count().await.unwrap(), 60);

    let mut uploader = Uploader::new(
        server.uri(),
        "secret-token".to_string(),
        30,
        Duration::from_secs(5),
        Duration::from_secs(60),
    )
    .unwrap();

    uploader.upload_once(&spool).await.unwrap();
    assert_eq!(spool.count().await.unwrap(), 30);

    uploader.upload_once(&spool).await.unwrap();
    assert_eq!(spool.count().await.unwrap(), 0);
}
