//! The `samples` hypertable and its three rollup views (spec §4.12).
//!
//! Grounded in the teacher's `sqlx::query(...).bind(...)` repository
//! style (see the pack's `voltage-rules/src/repository.rs`), adapted from
//! SQLite to PostgreSQL/TimescaleDB. Every statement is parameterized.
//! Migrations live under `migrations/` and run via `sqlx::migrate!` at
//! startup, the minimal idiomatic stand-in for a bespoke migration
//! runner (out of scope per spec §1).

use crate::error::{Result, ServerError};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use telemetry_common::Sample;

/// SQLSTATE for PostgreSQL's "undefined_table" — the precise condition
/// the series endpoint's rollup-view fallback reacts to (spec §4.11),
/// not a string match on the driver's error message.
const UNDEFINED_TABLE_SQLSTATE: &str = "42P01";

#[derive(Clone)]
pub struct Storage {
    pool: PgPool,
}

/// One rollup bucket as read from either a pre-aggregated view or the
/// raw-table fallback query; both paths select the same column set.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Bucket {
    pub bucket: DateTime<Utc>,
    pub avg_pv_power_w: f64,
    pub max_pv_power_w: f64,
    pub avg_battery_power_w: f64,
    pub avg_battery_soc_pct: f64,
    pub avg_load_power_w: f64,
    pub avg_export_power_w: f64,
    pub sample_count: i64,
}

fn row_to_bucket(row: PgRow) -> Result<Bucket> {
    Ok(Bucket {
        bucket: row.try_get("bucket")?,
        avg_pv_power_w: row.try_get("avg_pv_power_w")?,
        max_pv_power_w: row.try_get("max_pv_power_w")?,
        avg_battery_power_w: row.try_get("avg_battery_power_w")?,
        avg_battery_soc_pct: row.try_get("avg_battery_soc_pct")?,
        avg_load_power_w: row.try_get("avg_load_power_w")?,
        avg_export_power_w: row.try_get("avg_export_power_w")?,
        sample_count: row.try_get("sample_count")?,
    })
}

fn row_to_sample(row: PgRow) -> Result<Sample> {
    Ok(Sample {
        device_id: row.try_get("device_id")?,
        ts: row.try_get("ts")?,
        pv_power_w: row.try_get("pv_power_w")?,
        pv_daily_kwh: row.try_get("pv_daily_kwh")?,
        battery_power_w: row.try_get("battery_power_w")?,
        battery_soc_pct: row.try_get("battery_soc_pct")?,
        battery_temp_c: row.try_get("battery_temp_c")?,
        load_power_w: row.try_get("load_power_w")?,
        export_power_w: row.try_get("export_power_w")?,
        sample_count: {
            let n: i32 = row.try_get("sample_count")?;
            n as u32
        },
    })
}

/// True if `err` is a PostgreSQL "undefined_table" error (SQLSTATE
/// `42P01`) — i.e. the rollup view genuinely doesn't exist, as opposed
/// to some other storage failure which must surface as a 500.
fn is_undefined_table(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNDEFINED_TABLE_SQLSTATE))
}

impl Storage {
    /// Connects a bounded pool and applies pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| ServerError::Internal(format!("migration failed: {e}")))?;
        Ok(Self { pool })
    }

    /// Wraps an already-connected, already-migrated pool. Used by
    /// integration tests that provision a throwaway database via
    /// `#[sqlx::test]` rather than `connect()`'s own `DATABASE_URL` flow.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts every sample in one transaction, skipping conflicts on
    /// `(device_id, ts)`. Returns the count of rows actually written
    /// (spec §4.9 step 5). An empty slice is a no-op with no round-trip.
    pub async fn insert_samples(&self, samples: &[Sample]) -> Result<u64> {
        if samples.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for sample in samples {
            let result = sqlx::query(
                r#"
                INSERT INTO samples
                    (device_id, ts, pv_power_w, pv_daily_kwh, battery_power_w,
                     battery_soc_pct, battery_temp_c, load_power_w, export_power_w,
                     sample_count)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (device_id, ts) DO NOTHING
                "#,
            )
            .bind(&sample.device_id)
            .bind(sample.ts)
            .bind(sample.pv_power_w)
            .bind(sample.pv_daily_kwh)
            .bind(sample.battery_power_w)
            .bind(sample.battery_soc_pct)
            .bind(sample.battery_temp_c)
            .bind(sample.load_power_w)
            .bind(sample.export_power_w)
            .bind(sample.sample_count as i32)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }

    /// Most-recent sample for `device_id`, or `None` if it has never
    /// reported (spec §4.10 step 3).
    pub async fn latest_sample(&self, device_id: &str) -> Result<Option<Sample>> {
        let row = sqlx::query(
            r#"
            SELECT device_id, ts, pv_power_w, pv_daily_kwh, battery_power_w,
                   battery_soc_pct, battery_temp_c, load_power_w, export_power_w,
                   sample_count
            FROM samples
            WHERE device_id = $1
            ORDER BY ts DESC
            LIMIT 1
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_sample).transpose()
    }

    /// Queries a pre-aggregated rollup view, falling back to an explicit
    /// `time_bucket()` aggregation over the raw table if the view is
    /// undefined (spec §4.11 step 5). `time_filter` is a SQL fragment
    /// with no user-controlled content (one of four fixed strings chosen
    /// by the series handler, never built from request data).
    pub async fn series(
        &self,
        view: &str,
        raw_bucket_interval: &str,
        time_filter: &str,
        device_id: &str,
    ) -> Result<Vec<Bucket>> {
        let view_sql = format!(
            "SELECT bucket, avg_pv_power_w, max_pv_power_w, avg_battery_power_w, \
             avg_battery_soc_pct, avg_load_power_w, avg_export_power_w, sample_count \
             FROM {view} WHERE device_id = $1 {time_filter} ORDER BY bucket ASC"
        );
        match sqlx::query(&view_sql)
            .bind(device_id)
            .fetch_all(&self.pool)
            .await
        {
            Ok(rows) => rows.into_iter().map(row_to_bucket).collect(),
            Err(e) if is_undefined_table(&e) => {
                tracing::warn!(view, "rollup view undefined, falling back to raw aggregation");
                self.series_fallback(raw_bucket_interval, time_filter, device_id)
                    .await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn series_fallback(
        &self,
        raw_bucket_interval: &str,
        time_filter: &str,
        device_id: &str,
    ) -> Result<Vec<Bucket>> {
        let sql = format!(
            "SELECT time_bucket('{raw_bucket_interval}', ts) AS bucket, \
             avg(pv_power_w) AS avg_pv_power_w, \
             max(pv_power_w) AS max_pv_power_w, \
             avg(battery_power_w) AS avg_battery_power_w, \
             avg(battery_soc_pct) AS avg_battery_soc_pct, \
             avg(load_power_w) AS avg_load_power_w, \
             avg(export_power_w) AS avg_export_power_w, \
             sum(sample_count) AS sample_count \
             FROM samples WHERE device_id = $1 {time_filter} \
             GROUP BY bucket ORDER BY bucket ASC"
        );
        let rows = sqlx::query(&sql).bind(device_id).fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_bucket).collect()
    }
}
