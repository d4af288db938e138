//! `POST /v1/ingest` — idempotent batch insert (spec §4.9).
//!
//! The pre-parse `Content-Length` guards run as an `axum::middleware`
//! layer (see [`content_length_guard`]) so an oversized body is rejected
//! before the JSON extractor ever allocates a buffer, grounded in the
//! teacher's `tower_http`/`axum` middleware layering in `web_axum.rs`.

use crate::error::{Result, ServerError};
use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use telemetry_common::Sample;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub samples: Vec<Sample>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub inserted: u64,
}

/// Runs before the body is read: rejects a malformed `Content-Length`
/// with 400, and one exceeding `max_request_bytes` with 413 — both
/// before any allocation for the body itself (spec §4.9 pre-parse
/// guards).
pub async fn content_length_guard(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    if let Some(raw) = headers.get(axum::http::header::CONTENT_LENGTH) {
        let parsed = raw.to_str().ok().and_then(|s| s.parse::<i64>().ok());
        match parsed {
            None => {
                return ServerError::BadRequest("Content-Length is not a valid integer".to_string())
                    .into_response();
            }
            Some(n) if n < 0 => {
                return ServerError::BadRequest("Content-Length must not be negative".to_string())
                    .into_response();
            }
            Some(n) if n as u64 > state.max_request_bytes as u64 => {
                return ServerError::TooLarge(format!(
                    "request body exceeds {} bytes",
                    state.max_request_bytes
                ))
                .into_response();
            }
            Some(_) => {}
        }
    }
    next.run(request).await
}

async fn authenticate(headers: &HeaderMap, tokens: &crate::auth::DeviceTokens) -> Result<String> {
    let candidate = crate::auth::extract_bearer(
        headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok()),
    )
    .ok_or(ServerError::Unauthorized)?;
    tokens.authenticate(candidate)
}

pub async fn ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let auth_device_id = authenticate(&headers, &state.tokens).await?;

    // Body may still exceed the limit if Content-Length was absent or
    // understated (e.g. chunked transfer); the byte-count check holds
    // regardless of what the header claimed.
    if body.len() > state.max_request_bytes {
        return Err(ServerError::TooLarge(format!(
            "request body exceeds {} bytes",
            state.max_request_bytes
        )));
    }

    let request: IngestRequest = serde_json::from_slice(&body)
        .map_err(|e| ServerError::Unprocessable(format!("malformed request body: {e}")))?;

    for sample in &request.samples {
        sample.validate().map_err(ServerError::Unprocessable)?;
    }

    if request.samples.len() > state.max_samples_per_request {
        return Err(ServerError::TooLarge(format!(
            "batch of {} samples exceeds the limit of {}",
            request.samples.len(),
            state.max_samples_per_request
        )));
    }

    if request.samples.is_empty() {
        return Ok(Json(IngestResponse { inserted: 0 }));
    }

    for sample in &request.samples {
        if sample.device_id != auth_device_id {
            return Err(ServerError::Forbidden(
                "sample device_id does not match the authenticated token".to_string(),
            ));
        }
    }

    let inserted = state.storage.insert_samples(&request.samples).await?;

    state
        .cache
        .del(&crate::cache::Cache::realtime_key(&auth_device_id))
        .await;

    Ok(Json(IngestResponse { inserted }))
}
