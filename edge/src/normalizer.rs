//! Pure transform from raw Modbus words to a typed [`Sample`].
//!
//! No I/O, no clock: the timestamp and device id are injected arguments
//! (spec §4.4). A sample is rejected in full if any source register is
//! missing or any scaled value falls outside its descriptor's declared
//! range.

use crate::modbus_client::RawRegisterMap;
use crate::registers::RegisterGroup;
use chrono::{DateTime, Utc};
use telemetry_common::Sample;
use tracing::warn;

/// Normalizes one poll cycle's raw register map into a `Sample`, or
/// returns `None` (logging one warning per rejected field) if any
/// required register is missing or out of range.
pub fn normalize(
    groups: &[RegisterGroup],
    raw: &RawRegisterMap,
    device_id: &str,
    ts: DateTime<Utc>,
) -> Option<Sample> {
    let mut scaled: std::collections::HashMap<&str, f64> = std::collections::HashMap::new();

    for group in groups {
        for desc in &group.descriptors {
            let Some(&raw_value) = raw.get(desc.name) else {
                warn!(field = desc.name, "missing source register, rejecting sample");
                return None;
            };
            let value = raw_value as f64 * desc.scale;
            if value < desc.min || value > desc.max {
                warn!(
                    field = desc.name,
                    raw = raw_value,
                    value,
                    min = desc.min,
                    max = desc.max,
                    "value out of declared range, rejecting sample"
                );
                return None;
            }
            scaled.insert(desc.name, value);
        }
    }

    let get = |name: &str| scaled.get(name).copied();

    let sample = Sample {
        device_id: device_id.to_string(),
        ts,
        pv_power_w: get("pv_power_w")?,
        pv_daily_kwh: get("pv_daily_kwh"),
        battery_power_w: get("battery_power_w")?,
        battery_soc_pct: get("battery_soc_pct")?,
        battery_temp_c: get("battery_temp_c"),
        load_power_w: get("load_power_w")?,
        export_power_w: get("export_power_w")?,
        sample_count: 1,
    };

    if let Err(reason) = sample.validate() {
        warn!(reason, "normalized sample failed validation, rejecting");
        return None;
    }

    Some(sample)
}
