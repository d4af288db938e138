//! `GET /health` — unauthenticated liveness, no database or cache access
//! (spec §4.14). Only reachable on the internal network boundary; the
//! public-facing reverse proxy that enforces that boundary is out of
//! scope here (spec §1).

use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
