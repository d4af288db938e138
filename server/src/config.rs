//! Environment-driven configuration for the telemetry server (spec §6.3).

use crate::error::{Result, ServerError};

#[derive(Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub cache_url: String,
    pub device_tokens_raw: String,
    pub cache_ttl_s: u64,
    pub max_samples_per_request: usize,
    pub max_request_bytes: usize,
    pub bind_host: String,
    pub bind_port: u16,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("database_url", &"<redacted>")
            .field("cache_url", &"<redacted>")
            .field("device_tokens_raw", &"<redacted>")
            .field("cache_ttl_s", &self.cache_ttl_s)
            .field("max_samples_per_request", &self.max_samples_per_request)
            .field("max_request_bytes", &self.max_request_bytes)
            .field("bind_host", &self.bind_host)
            .field("bind_port", &self.bind_port)
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
            .map_err(|_| ServerError::Config(format!("{key} is not a valid value: {raw}"))),
        _ => Ok(default),
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env_string("DATABASE_URL")
            .ok_or_else(|| ServerError::Config("DATABASE_URL is required".to_string()))?;
        let cache_url =
            env_string("CACHE_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string());
        let device_tokens_raw = env_string("DEVICE_TOKENS")
            .ok_or_else(|| ServerError::Config("DEVICE_TOKENS is required".to_string()))?;
        let cache_ttl_s: u64 = env_parsed("CACHE_TTL_S", 5)?;
        let max_samples_per_request: usize = env_parsed("MAX_SAMPLES_PER_REQUEST", 1000)?;
        let max_request_bytes: usize = env_parsed("MAX_REQUEST_BYTES", 1_048_576)?;
        let bind_host = env_string("BIND_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let bind_port: u16 = env_parsed("BIND_PORT", 8080)?;

        let config = Self {
            database_url,
            cache_url,
            device_tokens_raw,
            cache_ttl_s,
            max_samples_per_request,
            max_request_bytes,
            bind_host,
            bind_port,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.device_tokens_raw.trim().is_empty() {
            return Err(ServerError::Config(
                "DEVICE_TOKENS must not be empty".to_string(),
            ));
        }
        if self.max_samples_per_request == 0 {
            return Err(ServerError::Config(
                "MAX_SAMPLES_PER_REQUEST must be >= 1".to_string(),
            ));
        }
        if self.max_request_bytes == 0 {
            return Err(ServerError::Config(
                "MAX_REQUEST_BYTES must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}
