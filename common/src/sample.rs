//! The `Sample` record and its cross-field invariants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_sample_count() -> u32 {
    1
}

/// One normalized reading from an inverter at a specific instant.
///
/// `(device_id, ts)` is globally unique in server storage; duplicates are
/// silently ignored by the ingest endpoint's upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub device_id: String,
    pub ts: DateTime<Utc>,
    pub pv_power_w: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pv_daily_kwh: Option<f64>,
    pub battery_power_w: f64,
    pub battery_soc_pct: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_temp_c: Option<f64>,
    pub load_power_w: f64,
    pub export_power_w: f64,
    #[serde(default = "default_sample_count")]
    pub sample_count: u32,
}

impl Sample {
    /// Checks the invariants every `Sample` must satisfy regardless of
    /// where it was constructed (edge normalizer or server ingest parse).
    ///
    /// Returns the name of the first field that fails, if any.
    pub fn validate(&self) -> Result<(), String> {
        if self.device_id.is_empty() {
            return Err("device_id must not be empty".to_string());
        }
        if !(0.0..=100.0).contains(&self.battery_soc_pct) {
            return Err("battery_soc_pct must be within 0..=100".to_string());
        }
        if self.sample_count < 1 {
            return Err("sample_count must be >= 1".to_string());
        }
        for (name, value) in [
            ("pv_power_w", self.pv_power_w),
            ("battery_power_w", self.battery_power_w),
            ("load_power_w", self.load_power_w),
            ("export_power_w", self.export_power_w),
        ] {
            if !value.is_finite() {
                return Err(format!("{name} must be finite"));
            }
        }
        if self.pv_power_w < 0.0 {
            return Err("pv_power_w must be >= 0".to_string());
        }
        if let Some(t) = self.battery_temp_c
            && !t.is_finite()
        {
            return Err("battery_temp_c must be finite".to_string());
        }
        if let Some(k) = self.pv_daily_kwh
            && !k.is_finite()
        {
            return Err("pv_daily_kwh must be finite".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Sample {
        Sample {
            device_id: "inv-01".to_string(),
            ts: Utc::now(),
            pv_power_w: 3450.0,
            pv_daily_kwh: Some(12.3),
            battery_power_w: -120.0,
            battery_soc_pct: 76.5,
            battery_temp_c: Some(28.1),
            load_power_w: 540.0,
            export_power_w: -100.0,
            sample_count: 1,
        }
    }

    #[test]
    fn valid_sample_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn soc_out_of_range_is_rejected() {
        let mut s = sample();
        s.battery_soc_pct = 101.0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn negative_pv_power_is_rejected() {
        let mut s = sample();
        s.pv_power_w = -1.0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn zero_sample_count_is_rejected() {
        let mut s = sample();
        s.sample_count = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn empty_device_id_is_rejected() {
        let mut s = sample();
        s.device_id = String::new();
        assert!(s.validate().is_err());
    }

    #[test]
    fn default_sample_count_is_one_when_omitted() {
        let json = serde_json::json!({
            "device_id": "inv-01",
            "ts": "2026-02-15T10:30:00Z",
            "pv_power_w": 3450.0,
            "battery_power_w": 0.0,
            "battery_soc_pct": 50.0,
            "load_power_w": 100.0,
            "export_power_w": -50.0,
        });
        let sample: Sample = serde_json::from_value(json).unwrap();
        assert_eq!(sample.sample_count, 1);
    }
}
