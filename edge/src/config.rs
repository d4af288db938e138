//! Configuration loader for the edge daemon.
//!
//! All parameters are environment-variable driven (§4.1/§6.3 of the
//! specification). Loading validates every constraint up front and fails
//! fast before any network I/O is attempted; the device token is never
//! logged, so [`EdgeConfig`] hand-writes its `Debug` impl to redact it.

use crate::error::{EdgeError, Result};
use std::time::Duration;

#[derive(Clone)]
pub struct EdgeConfig {
    pub inverter_host: String,
    pub inverter_port: u16,
    pub slave_id: u8,
    pub poll_interval: Duration,
    pub inter_group_delay: Duration,
    pub device_id: String,
    pub batch_size: usize,
    pub upload_interval: Duration,
    pub spool_path: String,
    pub server_base_url: String,
    pub device_token: String,
    pub modbus_timeout: Duration,
    pub modbus_backoff_max: Duration,
    pub upload_backoff_max: Duration,
    pub upload_timeout: Duration,
    pub heartbeat_path: String,
}

impl std::fmt::Debug for EdgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeConfig")
            .field("inverter_host", &self.inverter_host)
            .field("inverter_port", &self.inverter_port)
            .field("slave_id", &self.slave_id)
            .field("poll_interval", &self.poll_interval)
            .field("inter_group_delay", &self.inter_group_delay)
            .field("device_id", &self.device_id)
            .field("batch_size", &self.batch_size)
            .field("upload_interval", &self.upload_interval)
            .field("spool_path", &self.spool_path)
            .field("server_base_url", &self.server_base_url)
            .field("device_token", &"<redacted>")
            .finish()
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) if !raw.is_empty() => raw
            .parse::<T>()
            .map_err(|_| EdgeError::config(format!("{key} is not a valid value: {raw}"))),
        _ => Ok(default),
    }
}

impl EdgeConfig {
    /// Loads configuration from the process environment and validates it.
    pub fn from_env() -> Result<Self> {
        let inverter_host = env_string("INVERTER_HOST")
            .ok_or_else(|| EdgeError::config("INVERTER_HOST is required"))?;
        let inverter_port: u16 = env_parsed("INVERTER_PORT", 502)?;
        let slave_id: u8 = env_parsed("SLAVE_ID", 1)?;
        let poll_interval_s: u64 = env_parsed("POLL_INTERVAL_S", 5)?;
        let inter_group_delay_ms: u64 = env_parsed("INTER_GROUP_DELAY_MS", 20)?;
        let device_id = env_string("DEVICE_ID").unwrap_or_else(|| inverter_host.clone());
        let batch_size: usize = env_parsed("BATCH_SIZE", 30)?;
        let upload_interval_s: u64 = env_parsed("UPLOAD_INTERVAL_S", 10)?;
        let spool_path = env_string("SPOOL_PATH").unwrap_or_else(|| "/data/spool.db".to_string());
        let server_base_url = env_string("SERVER_BASE_URL")
            .ok_or_else(|| EdgeError::config("SERVER_BASE_URL is required"))?;
        let device_token = env_string("DEVICE_TOKEN")
            .ok_or_else(|| EdgeError::config("DEVICE_TOKEN is required"))?;
        let modbus_backoff_max_s: u64 = env_parsed("MODBUS_BACKOFF_MAX_S", 60)?;
        let upload_backoff_max_s: u64 = env_parsed("UPLOAD_BACKOFF_MAX_S", 300)?;
        let upload_timeout_s: u64 = env_parsed("UPLOAD_TIMEOUT_S", 30)?;
        let heartbeat_path =
            env_string("HEALTH_PATH").unwrap_or_else(|| "/data/health.json".to_string());

        let config = Self {
            inverter_host,
            inverter_port,
            slave_id,
            poll_interval: Duration::from_secs(poll_interval_s),
            inter_group_delay: Duration::from_millis(inter_group_delay_ms),
            device_id,
            batch_size,
            upload_interval: Duration::from_secs(upload_interval_s),
            spool_path,
            server_base_url,
            device_token,
            modbus_timeout: Duration::from_secs(10),
            modbus_backoff_max: Duration::from_secs(modbus_backoff_max_s),
            upload_backoff_max: Duration::from_secs(upload_backoff_max_s),
            upload_timeout: Duration::from_secs(upload_timeout_s),
            heartbeat_path,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates every constraint from spec §4.1.
    pub fn validate(&self) -> Result<()> {
        if self.inverter_host.is_empty() {
            return Err(EdgeError::config("inverter host must not be empty"));
        }
        if self.inverter_port == 0 {
            return Err(EdgeError::config("inverter port must be 1-65535"));
        }
        if !(1..=247).contains(&self.slave_id) {
            return Err(EdgeError::config("slave id must be 1-247"));
        }
        if self.poll_interval < Duration::from_secs(5) {
            return Err(EdgeError::config("poll interval must be >= 5s"));
        }
        if self.device_id.is_empty() {
            return Err(EdgeError::config("device id must not be empty"));
        }
        if !(1..=1000).contains(&self.batch_size) {
            return Err(EdgeError::config("batch size must be 1-1000"));
        }
        if self.upload_interval < Duration::from_secs(1) {
            return Err(EdgeError::config("upload interval must be >= 1s"));
        }
        if self.spool_path.is_empty() {
            return Err(EdgeError::config("spool path must not be empty"));
        }
        if !self.server_base_url.starts_with("https://") {
            return Err(EdgeError::config("server base URL must start with https://"));
        }
        if self.device_token.is_empty() {
            return Err(EdgeError::config("device token must not be empty"));
        }
        Ok(())
    }
}
