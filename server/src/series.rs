//! `GET /v1/series` — time-bucketed rollup reads (spec §4.11).

use crate::error::{Result, ServerError};
use crate::storage::Bucket;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::AppState;

/// One of the four rollup granularities a client may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Day,
    Month,
    Year,
    All,
}

pub const ALLOWED_FRAMES: [&str; 4] = ["day", "month", "year", "all"];

impl Frame {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "day" => Some(Self::Day),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        }
    }

    /// Routes the frame to its `(source_view, raw_bucket_interval,
    /// time_filter)` triple, per the table in spec §4.11 step 3. The
    /// time filter is always one of these four fixed, non-user-derived
    /// SQL fragments.
    fn route(self, now: DateTime<Utc>) -> (&'static str, &'static str, String) {
        match self {
            Self::Day => (
                "samples_hourly",
                "1 hour",
                format!("AND bucket >= '{}'", start_of_day(now).to_rfc3339()),
            ),
            Self::Month => (
                "samples_daily",
                "1 day",
                format!("AND bucket >= '{}'", start_of_month(now).to_rfc3339()),
            ),
            Self::Year => (
                "samples_monthly",
                "1 month",
                format!("AND bucket >= '{}'", start_of_year(now).to_rfc3339()),
            ),
            Self::All => ("samples_monthly", "1 month", String::new()),
        }
    }
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_hms_opt(0, 0, 0).unwrap_or_default().and_utc()
}

fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .with_day(1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
        .and_utc()
}

fn start_of_year(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .with_month(1)
        .and_then(|d| d.with_day(1))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
        .and_utc()
}

#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    pub device_id: String,
    pub frame: String,
}

#[derive(Debug, Serialize)]
pub struct BucketOut {
    pub bucket: DateTime<Utc>,
    pub avg_pv_power_w: f64,
    pub max_pv_power_w: f64,
    pub avg_battery_power_w: f64,
    pub avg_battery_soc_pct: f64,
    pub avg_load_power_w: f64,
    pub avg_export_power_w: f64,
    pub sample_count: i64,
}

impl From<Bucket> for BucketOut {
    fn from(b: Bucket) -> Self {
        Self {
            bucket: b.bucket,
            avg_pv_power_w: b.avg_pv_power_w,
            max_pv_power_w: b.max_pv_power_w,
            avg_battery_power_w: b.avg_battery_power_w,
            avg_battery_soc_pct: b.avg_battery_soc_pct,
            avg_load_power_w: b.avg_load_power_w,
            avg_export_power_w: b.avg_export_power_w,
            sample_count: b.sample_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SeriesResponse {
    pub device_id: String,
    pub frame: String,
    pub series: Vec<BucketOut>,
}

pub async fn series(
    State(state): State<AppState>,
    Query(params): Query<SeriesQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    crate::auth::authenticate_for_device(&headers, &state.tokens, &params.device_id)?;

    let Some(frame) = Frame::parse(&params.frame) else {
        return Err(ServerError::Unprocessable(format!(
            "frame must be one of: {}",
            ALLOWED_FRAMES.join(", ")
        )));
    };

    let (view, raw_interval, time_filter) = frame.route(Utc::now());
    let buckets = state
        .storage
        .series(view, raw_interval, &time_filter, &params.device_id)
        .await?;

    Ok(Json(SeriesResponse {
        device_id: params.device_id,
        frame: frame.as_str().to_string(),
        series: buckets.into_iter().map(BucketOut::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_allowed_frames() {
        assert_eq!(Frame::parse("day"), Some(Frame::Day));
        assert_eq!(Frame::parse("month"), Some(Frame::Month));
        assert_eq!(Frame::parse("year"), Some(Frame::Year));
        assert_eq!(Frame::parse("all"), Some(Frame::All));
        assert_eq!(Frame::parse("week"), None);
    }

    #[test]
    fn day_routes_to_hourly_rollup_with_day_filter() {
        let now: DateTime<Utc> = "2026-02-15T10:30:00Z".parse().unwrap();
        let (view, interval, filter) = Frame::Day.route(now);
        assert_eq!(view, "samples_hourly");
        assert_eq!(interval, "1 hour");
        assert!(filter.contains("2026-02-15T00:00:00"));
    }

    #[test]
    fn all_has_no_time_filter() {
        let now = Utc::now();
        let (view, interval, filter) = Frame::All.route(now);
        assert_eq!(view, "samples_monthly");
        assert_eq!(interval, "1 month");
        assert!(filter.is_empty());
    }

    #[test]
    fn year_routes_to_monthly_rollup_with_year_filter() {
        let now: DateTime<Utc> = "2026-07-28T12:00:00Z".parse().unwrap();
        let (view, _interval, filter) = Frame::Year.route(now);
        assert_eq!(view, "samples_monthly");
        assert!(filter.contains("2026-01-01T00:00:00"));
    }
}
