//! Bearer-token auth: a token -> device_id binding parsed once at startup
//! (spec §4.8). Every `/v1/*` handler authenticates through
//! [`DeviceTokens::authenticate`] before touching the database or cache.

use crate::error::{Result, ServerError};
use axum::http::HeaderMap;
use std::collections::HashMap;

/// The parsed `DEVICE_TOKENS` mapping: `token -> device_id`.
#[derive(Clone)]
pub struct DeviceTokens {
    tokens: HashMap<String, String>,
}

impl std::fmt::Debug for DeviceTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceTokens")
            .field("count", &self.tokens.len())
            .finish()
    }
}

impl DeviceTokens {
    /// Parses `tok1:dev1,tok2:dev2,...`. An empty mapping is a fatal
    /// configuration error (spec §4.8).
    pub fn parse(raw: &str) -> Result<Self> {
        let mut tokens = HashMap::new();
        for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (token, device_id) = pair.split_once(':').ok_or_else(|| {
                ServerError::Config(format!("malformed DEVICE_TOKENS entry: {pair}"))
            })?;
            if token.is_empty() || device_id.is_empty() {
                return Err(ServerError::Config(format!(
                    "malformed DEVICE_TOKENS entry: {pair}"
                )));
            }
            tokens.insert(token.to_string(), device_id.to_string());
        }
        if tokens.is_empty() {
            return Err(ServerError::Config(
                "DEVICE_TOKENS must bind at least one token".to_string(),
            ));
        }
        Ok(Self { tokens })
    }

    /// Compares `candidate` against every configured token in constant
    /// time and returns the bound device id on a match. Never short-
    /// circuits on length or content so response timing doesn't leak
    /// which prefix of a token matched.
    pub fn authenticate(&self, candidate: &str) -> Result<String> {
        let mut matched: Option<&str> = None;
        for (token, device_id) in &self.tokens {
            if constant_time_eq(token.as_bytes(), candidate.as_bytes()) {
                matched = Some(device_id);
            }
        }
        matched
            .map(str::to_string)
            .ok_or(ServerError::Unauthorized)
    }
}

/// Fixed-time byte comparison: always walks the longer of the two
/// buffers so neither length nor content is observable from timing.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let len_diff = (a.len() ^ b.len()) as u8;
    let mut diff = len_diff;
    let n = a.len().max(b.len());
    for i in 0..n {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= x ^ y;
    }
    diff == 0
}

/// Extracts the bearer credential from an `Authorization` header value,
/// e.g. `"Bearer abc123"` -> `Some("abc123")`.
pub fn extract_bearer(header_value: Option<&str>) -> Option<&str> {
    header_value?.strip_prefix("Bearer ").map(str::trim)
}

/// Authenticates a request and checks the authenticated device matches
/// `device_id`, the shared guard `/v1/realtime` and `/v1/series` both
/// apply before touching storage (spec §4.10 step 1, §4.11 step 1).
pub fn authenticate_for_device(
    headers: &HeaderMap,
    tokens: &DeviceTokens,
    device_id: &str,
) -> Result<()> {
    let candidate = extract_bearer(
        headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok()),
    )
    .ok_or(ServerError::Unauthorized)?;
    let auth_device_id = tokens.authenticate(candidate)?;
    if auth_device_id != device_id {
        return Err(ServerError::Forbidden(
            "device_id does not match the authenticated token".to_string(),
        ));
    }
    Ok(())
}
