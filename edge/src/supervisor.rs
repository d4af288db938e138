//! Two concurrent cooperative activities sharing one spool: poll and
//! upload (spec §4.7, §5). Each has its own catch-all error handler so a
//! failure in one never stops the other. Shutdown is a one-way flag
//! observed at the next suspension point in each loop.

use crate::config::EdgeConfig;
use crate::modbus_client::ModbusClient;
use crate::normalizer::normalize;
use crate::registers::{register_map, RegisterGroup};
use crate::spool::Spool;
use crate::uploader::Uploader;
use chrono::Utc;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::interval;
use tracing::{error, info, warn};

#[derive(Serialize, Default)]
struct Heartbeat {
    last_poll_ts: Option<String>,
    last_upload_ts: Option<String>,
    spool_count: i64,
}

/// Atomically rewrites the heartbeat file (write-to-temp-then-rename),
/// the same crash-safe idiom the teacher crate uses for persisted state.
fn write_heartbeat(path: &str, heartbeat: &Heartbeat) {
    let Ok(json) = serde_json::to_string(heartbeat) else {
        return;
    };
    let tmp_path = format!("{path}.tmp");
    if std::fs::write(&tmp_path, json).is_ok() {
        let _ = std::fs::rename(&tmp_path, path);
    }
}

struct SharedHeartbeat {
    path: String,
    last_poll_ts: tokio::sync::Mutex<Option<String>>,
    last_upload_ts: tokio::sync::Mutex<Option<String>>,
}

impl SharedHeartbeat {
    fn new(path: String) -> Self {
        Self {
            path,
            last_poll_ts: tokio::sync::Mutex::new(None),
            last_upload_ts: tokio::sync::Mutex::new(None),
        }
    }

    async fn record_poll(&self, spool_count: i64) {
        let ts = Utc::now().to_rfc3339();
        *self.last_poll_ts.lock().await = Some(ts);
        self.flush(spool_count).await;
    }

    async fn record_upload(&self, spool_count: i64) {
        let ts = Utc::now().to_rfc3339();
        *self.last_upload_ts.lock().await = Some(ts);
        self.flush(spool_count).await;
    }

    async fn flush(&self, spool_count: i64) {
        let heartbeat = Heartbeat {
            last_poll_ts: self.last_poll_ts.lock().await.clone(),
            last_upload_ts: self.last_upload_ts.lock().await.clone(),
            spool_count,
        };
        write_heartbeat(&self.path, &heartbeat);
    }
}

async fn poll_loop(
    config: EdgeConfig,
    groups: Vec<RegisterGroup>,
    spool: Spool,
    heartbeat: Arc<SharedHeartbeat>,
    shutdown: Arc<AtomicBool>,
) {
    let mut client = ModbusClient::new(
        config.inverter_host.clone(),
        config.inverter_port,
        config.slave_id,
        config.modbus_timeout,
        config.inter_group_delay,
        config.modbus_backoff_max,
    );
    let mut ticker = interval(config.poll_interval);

    loop {
        ticker.tick().await;
        if shutdown.load(Ordering::Relaxed) {
            info!("poll loop observed shutdown, stopping");
            return;
        }

        match client.poll(&groups).await {
            Ok(raw) => {
                let ts = Utc::now();
                if let Some(sample) = normalize(&groups, &raw, &config.device_id, ts) {
                    if let Err(e) = spool.enqueue(&sample).await {
                        error!(error = %e, "failed to enqueue sample");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "poll cycle failed");
            }
        }

        let count = spool.count().await.unwrap_or(0);
        heartbeat.record_poll(count).await;
    }
}

async fn upload_loop(
    config: EdgeConfig,
    spool: Spool,
    heartbeat: Arc<SharedHeartbeat>,
    shutdown: Arc<AtomicBool>,
) {
    let mut uploader = match Uploader::new(
        config.server_base_url.clone(),
        config.device_token.clone(),
        config.batch_size,
        config.upload_timeout,
        config.upload_backoff_max,
    ) {
        Ok(u) => u,
        Err(e) => {
            error!(error = %e, "failed to construct uploader, upload loop exiting");
            return;
        }
    };
    let mut ticker = interval(config.upload_interval);

    loop {
        ticker.tick().await;
        if shutdown.load(Ordering::Relaxed) {
            info!("upload loop draining before shutdown");
            if let Err(e) = uploader.upload_once(&spool).await {
                warn!(error = %e, "final drain attempt failed");
            }
            return;
        }

        if let Err(e) = uploader.upload_once(&spool).await {
            warn!(error = %e, "upload cycle failed");
        }

        let count = spool.count().await.unwrap_or(0);
        heartbeat.record_upload(count).await;
    }
}

/// Waits for SIGINT/SIGTERM and flips the shared shutdown flag.
///
/// Installing the SIGTERM handler is the only way this can fail, and it
/// can only fail at startup (a second handler for the same signal is
/// never installed), so that failure is propagated as a normal
/// configuration-fatal error rather than a panic.
async fn wait_for_shutdown_signal(shutdown: Arc<AtomicBool>) -> crate::error::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("shutdown signal received");
    shutdown.store(true, Ordering::Relaxed);
    Ok(())
}

/// Runs the two cooperative activities until a shutdown signal arrives,
/// then waits for both to finish their final iteration.
pub async fn run(config: EdgeConfig) -> crate::error::Result<()> {
    if let Some(parent) = Path::new(&config.heartbeat_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let groups = register_map();
    crate::registers::validate_register_map(&groups)
        .map_err(|e| crate::error::EdgeError::config(format!("invalid register map: {e:?}")))?;

    let spool = Spool::open(&config.spool_path).await?;
    let heartbeat = Arc::new(SharedHeartbeat::new(config.heartbeat_path.clone()));
    let shutdown = Arc::new(AtomicBool::new(false));

    let poll_handle = tokio::spawn(poll_loop(
        config.clone(),
        groups,
        spool.clone(),
        heartbeat.clone(),
        shutdown.clone(),
    ));
    let upload_handle = tokio::spawn(upload_loop(
        config.clone(),
        spool,
        heartbeat,
        shutdown.clone(),
    ));

    wait_for_shutdown_signal(shutdown).await?;

    let _ = poll_handle.await;
    let _ = upload_handle.await;
    info!("supervisor shutdown complete");
    Ok(())
}
