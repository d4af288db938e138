//! Router-level HTTP tests for `/v1/ingest` (spec §4.9, §8 scenarios
//! 1/4/5), driven in-process with `tower::ServiceExt::oneshot`, the same
//! pattern the teacher's `web_tests.rs` uses. Requires a reachable cache
//! at `CACHE_URL` (defaulting to `redis://127.0.0.1:6379`) alongside the
//! `#[sqlx::test]`-provisioned database; both are assumed available the
//! way `DATABASE_URL` already is for the storage integration tests.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use sqlx::PgPool;
use telemetry_server::auth::DeviceTokens;
use telemetry_server::cache::Cache;
use telemetry_server::storage::Storage;
use telemetry_server::{build_router, AppState};
use tower::ServiceExt;

async fn state_with(pool: PgPool) -> AppState {
    let cache_url =
        std::env::var("CACHE_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    AppState {
        tokens: DeviceTokens::parse("secret-token:inv-01").unwrap(),
        storage: Storage::from_pool(pool),
        cache: Cache::connect(&cache_url, 5).await.expect("cache reachable for integration test"),
        max_samples_per_request: 1000,
        max_request_bytes: 1_048_576,
    }
}

fn ingest_body() -> serde_json::Value {
    serde_json::json!({
        "samples": [{
            "device_id": "inv-01",
            "ts": "2026-02-15T10:30:00Z",
            "pv_power_w": 3450.0,
            "battery_power_w": -120.0,
            "battery_soc_pct": 76.5,
            "load_power_w": 540.0,
            "export_power_w": -100.0
        }]
    })
}

#[sqlx::test(migrations = "./migrations")]
async fn happy_path_ingest_then_idempotent_replay(pool: PgPool) -> sqlx::Result<()> {
    let router = build_router(state_with(pool).await);

    let request = || {
        Request::builder()
            .method("POST")
            .uri("/v1/ingest")
            .header("authorization", "Bearer secret-token")
            .header("content-type", "application/json")
            .body(Body::from(ingest_body().to_string()))
            .unwrap()
    };

    let first = router.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let body: serde_json::Value =
        serde_json::from_slice(&first.into_body().collect().await.unwrap().to_bytes()).unwrap();
    assert_eq!(body["inserted"], 1);

    let second = router.oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let body: serde_json::Value =
        serde_json::from_slice(&second.into_body().collect().await.unwrap().to_bytes()).unwrap();
    assert_eq!(body["inserted"], 0, "replaying the same batch must insert nothing the second time");

    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn missing_bearer_token_is_unauthorized(pool: PgPool) -> sqlx::Result<()> {
    let router = build_router(state_with(pool).await);
    let request = Request::builder()
        .method("POST")
        .uri("/v1/ingest")
        .header("content-type", "application/json")
        .body(Body::from(ingest_body().to_string()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get("www-authenticate").unwrap(),
        "Bearer"
    );
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn device_mismatch_is_forbidden_and_writes_nothing(pool: PgPool) -> sqlx::Result<()> {
    let state = state_with(pool).await;
    let storage = state.storage.clone();
    let router = build_router(state);

    let mut body = ingest_body();
    body["samples"][0]["device_id"] = serde_json::json!("dev-B");
    let request = Request::builder()
        .method("POST")
        .uri("/v1/ingest")
        .header("authorization", "Bearer secret-token")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(storage.latest_sample("dev-B").await.unwrap().is_none());
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn oversize_content_length_is_rejected_before_parsing(pool: PgPool) -> sqlx::Result<()> {
    let state = state_with(pool).await;
    let max = state.max_request_bytes;
    let router = build_router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/v1/ingest")
        .header("authorization", "Bearer secret-token")
        .header("content-type", "application/json")
        .header("content-length", (max + 1).to_string())
        .body(Body::from(ingest_body().to_string()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn empty_samples_returns_zero_inserted(pool: PgPool) -> sqlx::Result<()> {
    let router = build_router(state_with(pool).await);
    let request = Request::builder()
        .method("POST")
        .uri("/v1/ingest")
        .header("authorization", "Bearer secret-token")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::json!({"samples": []}).to_string()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value =
        serde_json::from_slice(&response.into_body().collect().await.unwrap().to_bytes()).unwrap();
    assert_eq!(body["inserted"], 0);
    Ok(())
}
