//! Durable spool: a single-writer/single-reader FIFO over an embedded
//! SQLite database opened in WAL mode, grounded in
//! `EvanL1-VoltageEMS`'s `libs/common/src/sqlite/client.rs` (same
//! WAL + busy-timeout setup for an edge deployment).
//!
//! SQLite's own locking is the serialization boundary the specification
//! requires between the poll loop's `enqueue` and the upload loop's
//! `peek`/`ack`/`count` (§4.5, §5). All statements are parameterized.

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::time::Duration;
use telemetry_common::Sample;

#[derive(Clone)]
pub struct Spool {
    pool: SqlitePool,
}

impl Spool {
    /// Opens (creating if necessary) the spool file at `path` in
    /// crash-safe WAL mode and ensures the schema exists.
    pub async fn open(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS spool (
                rowid INTEGER PRIMARY KEY AUTOINCREMENT,
                payload TEXT NOT NULL,
                enqueued_at TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Inserts one row, committing before returning.
    pub async fn enqueue(&self, sample: &Sample) -> Result<()> {
        let payload = serde_json::to_string(sample)?;
        let enqueued_at = chrono::Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO spool (payload, enqueued_at) VALUES (?1, ?2)")
            .bind(payload)
            .bind(enqueued_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Returns up to `n` oldest unacknowledged rows by rowid ascending.
    /// Non-destructive.
    pub async fn peek(&self, n: usize) -> Result<Vec<(i64, Sample)>> {
        let rows = sqlx::query("SELECT rowid, payload FROM spool ORDER BY rowid ASC LIMIT ?1")
            .bind(n as i64)
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let rowid: i64 = row.try_get("rowid")?;
            let payload: String = row.try_get("payload")?;
            let sample: Sample = serde_json::from_str(&payload)?;
            out.push((rowid, sample));
        }
        Ok(out)
    }

    /// Deletes the listed rows in a single transaction.
    pub async fn ack(&self, rowids: &[i64]) -> Result<()> {
        if rowids.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for rowid in rowids {
            sqlx::query("DELETE FROM spool WHERE rowid = ?1")
                .bind(rowid)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Number of unacknowledged rows.
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM spool")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}
