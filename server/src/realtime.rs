//! `GET /v1/realtime` — read-through cache over "latest sample per
//! device" (spec §4.10).

use crate::error::{Result, ServerError};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RealtimeQuery {
    pub device_id: String,
}

pub async fn realtime(
    State(state): State<AppState>,
    Query(params): Query<RealtimeQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    crate::auth::authenticate_for_device(&headers, &state.tokens, &params.device_id)?;

    let key = crate::cache::Cache::realtime_key(&params.device_id);
    if let Some(cached) = state.cache.get(&key).await {
        if let Ok(value) = serde_json::from_str::<Value>(&cached) {
            return Ok(Json(value));
        }
        tracing::warn!(key, "cached realtime value was not valid JSON, ignoring");
    }

    let Some(sample) = state.storage.latest_sample(&params.device_id).await? else {
        return Err(ServerError::NotFound(format!(
            "No data found for device_id '{}'.",
            params.device_id
        )));
    };

    let value = serde_json::to_value(&sample)
        .map_err(|e| ServerError::Internal(format!("failed to serialize sample: {e}")))?;
    if let Ok(serialized) = serde_json::to_string(&value) {
        state.cache.set(&key, &serialized).await;
    }

    Ok(Json(value))
}
