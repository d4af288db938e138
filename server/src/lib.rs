//! Telemetry server: idempotent batch ingest, cached realtime reads, and
//! time-bucketed rollup reads for a fleet of inverter edge daemons.
//!
//! ## Architecture
//!
//! - `config`: environment-driven configuration, fails fast.
//! - `auth`: bearer-token -> device_id binding, constant-time compare.
//! - `storage`: the `samples` hypertable and its rollup views.
//! - `cache`: best-effort realtime read-through cache.
//! - `ingest`, `realtime`, `series`, `health`: the four HTTP endpoints.

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod ingest;
pub mod realtime;
pub mod series;
pub mod storage;

use auth::DeviceTokens;
use axum::routing::{get, post};
use axum::Router;
use cache::Cache;
use config::ServerConfig;
use storage::Storage;
use tower_http::trace::TraceLayer;

pub use error::{Result, ServerError};

/// Shared handler state: the auth binding, a database pool, a cache
/// handle, and the two request-size limits enforced by the ingest
/// endpoint (spec §4.9).
#[derive(Clone)]
pub struct AppState {
    pub tokens: DeviceTokens,
    pub storage: Storage,
    pub cache: Cache,
    pub max_samples_per_request: usize,
    pub max_request_bytes: usize,
}

impl AppState {
    pub async fn from_config(config: &ServerConfig) -> Result<Self> {
        let tokens = DeviceTokens::parse(&config.device_tokens_raw)?;
        let storage = Storage::connect(&config.database_url).await?;
        let cache = Cache::connect(&config.cache_url, config.cache_ttl_s)
            .await
            .map_err(|e| ServerError::Internal(format!("failed to connect to cache: {e}")))?;
        Ok(Self {
            tokens,
            storage,
            cache,
            max_samples_per_request: config.max_samples_per_request,
            max_request_bytes: config.max_request_bytes,
        })
    }
}

/// Builds the full router: the four `/v1/*` endpoints plus `/health`,
/// with the ingest route's pre-parse size guard layered in front of it
/// specifically (the guard depends on `max_request_bytes`, which only
/// the ingest endpoint enforces pre-parse; realtime/series have no
/// request body to bound).
pub fn build_router(state: AppState) -> Router {
    let ingest_routes = Router::new()
        .route("/v1/ingest", post(ingest::ingest))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            ingest::content_length_guard,
        ));

    Router::new()
        .merge(ingest_routes)
        .route("/v1/realtime", get(realtime::realtime))
        .route("/v1/series", get(series::series))
        .route("/health", get(health::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
