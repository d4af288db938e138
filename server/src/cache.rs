//! Best-effort key-value cache over the "latest sample per device"
//! keyspace (spec §4.13). Grounded in `EvanL1-VoltageEMS`'s
//! `libs/common/src/redis.rs` client wrapper, narrowed to the three
//! operations the realtime endpoint actually needs and with every
//! failure absorbed here rather than at the call site (Design Note:
//! "best-effort cache fallback").

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
    ttl_s: u64,
}

impl Cache {
    pub async fn connect(url: &str, ttl_s: u64) -> redis::RedisResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn, ttl_s })
    }

    pub fn realtime_key(device_id: &str) -> String {
        format!("realtime:{device_id}")
    }

    /// Returns the cached value, or `None` on a cache miss *or* any cache
    /// error (connection, timeout, protocol) — the caller always sees an
    /// option, never a propagated error.
    pub async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, key, "cache GET failed, treating as miss");
                None
            }
        }
    }

    /// Writes `value` with the configured TTL. A failure is logged and
    /// otherwise swallowed: the cache is never load-bearing for
    /// correctness, only for read latency.
    pub async fn set(&self, key: &str, value: &str) {
        let mut conn = self.conn.clone();
        if let Err(e) = conn
            .set_ex::<_, _, ()>(key, value, self.ttl_s.max(1))
            .await
        {
            warn!(error = %e, key, "cache SET failed, ignoring");
        }
    }

    /// Invalidates `key`. Best-effort, as with `set`.
    pub async fn del(&self, key: &str) {
        let mut conn = self.conn.clone();
        if let Err(e) = conn.del::<_, ()>(key).await {
            warn!(error = %e, key, "cache DEL failed, ignoring");
        }
    }
}
