//! Storage-layer integration tests against a real, migrated PostgreSQL
//! database (spec §8). `#[sqlx::test]` provisions and tears down a
//! throwaway database per test from `DATABASE_URL`, running the
//! `migrations/` directory before the test body runs.

use sqlx::PgPool;
use telemetry_common::Sample;
use telemetry_server::storage::Storage;

fn sample(device_id: &str, ts: chrono::DateTime<chrono::Utc>, pv_power_w: f64) -> Sample {
    Sample {
        device_id: device_id.to_string(),
        ts,
        pv_power_w,
        pv_daily_kwh: Some(1.5),
        battery_power_w: -120.0,
        battery_soc_pct: 76.5,
        battery_temp_c: Some(28.0),
        load_power_w: 540.0,
        export_power_w: -100.0,
        sample_count: 1,
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn idempotent_replay_inserts_once(pool: PgPool) -> sqlx::Result<()> {
    let storage = Storage::from_pool(pool);
    let ts = "2026-02-15T10:30:00Z".parse().unwrap();
    let batch = vec![sample("inv-01", ts, 3450.0)];

    let first = storage.insert_samples(&batch).await.unwrap();
    assert_eq!(first, 1);

    let second = storage.insert_samples(&batch).await.unwrap();
    assert_eq!(second, 0, "replaying the same (device_id, ts) must not duplicate the row");

    let latest = storage.latest_sample("inv-01").await.unwrap().unwrap();
    assert_eq!(latest.pv_power_w, 3450.0);

    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn latest_sample_is_none_for_unknown_device(pool: PgPool) -> sqlx::Result<()> {
    let storage = Storage::from_pool(pool);
    assert!(storage.latest_sample("never-seen").await.unwrap().is_none());
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn latest_sample_picks_the_most_recent_row(pool: PgPool) -> sqlx::Result<()> {
    let storage = Storage::from_pool(pool);
    let earlier = "2026-02-15T10:00:00Z".parse().unwrap();
    let later = "2026-02-15T10:30:00Z".parse().unwrap();
    storage
        .insert_samples(&[sample("inv-01", earlier, 1000.0), sample("inv-01", later, 3450.0)])
        .await
        .unwrap();

    let latest = storage.latest_sample("inv-01").await.unwrap().unwrap();
    assert_eq!(latest.pv_power_w, 3450.0);
    assert_eq!(latest.ts, later);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn series_falls_back_when_rollup_view_is_undefined(pool: PgPool) -> sqlx::Result<()> {
    // Drop the hourly view entirely to force the "undefined relation"
    // path (spec §4.11 step 5) instead of relying on TimescaleDB's
    // continuous-aggregate machinery being present in the test database.
    sqlx::query("DROP VIEW IF EXISTS samples_hourly")
        .execute(&pool)
        .await
        .unwrap();

    let storage = Storage::from_pool(pool);
    let ts = "2026-02-15T10:30:00Z".parse().unwrap();
    storage
        .insert_samples(&[sample("inv-01", ts, 3450.0)])
        .await
        .unwrap();

    let buckets = storage
        .series("samples_hourly", "1 hour", "", "inv-01")
        .await
        .unwrap();

    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].max_pv_power_w, 3450.0);
    assert_eq!(buckets[0].sample_count, 1);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
async fn empty_batch_is_a_no_op(pool: PgPool) -> sqlx::Result<()> {
    let storage = Storage::from_pool(pool);
    let inserted = storage.insert_samples(&[]).await.unwrap();
    assert_eq!(inserted, 0);
    Ok(())
}
