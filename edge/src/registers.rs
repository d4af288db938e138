//! The Modbus register map: a declarative, static description of the
//! inverter's input registers. This is data, not code (Design Note:
//! "represent the register map as a value").

/// Width of a register value in 16-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Single,
    Double,
}

/// One field's source registers and its engineering-unit transform.
#[derive(Debug, Clone)]
pub struct RegisterDescriptor {
    pub address: u16,
    pub name: &'static str,
    pub width: Width,
    pub signed: bool,
    pub scale: f64,
    pub min: f64,
    pub max: f64,
}

impl RegisterDescriptor {
    /// Number of 16-bit words this descriptor occupies.
    pub fn word_count(&self) -> u16 {
        match self.width {
            Width::Single => 1,
            Width::Double => 2,
        }
    }
}

/// A contiguous run of registers read in a single Modbus request.
#[derive(Debug, Clone)]
pub struct RegisterGroup {
    pub name: &'static str,
    pub start_address: u16,
    pub descriptors: Vec<RegisterDescriptor>,
}

impl RegisterGroup {
    /// Total word span of the group, i.e. the count to pass to a single
    /// "read input registers" request.
    pub fn word_span(&self) -> u16 {
        self.descriptors.iter().map(RegisterDescriptor::word_count).sum()
    }
}

fn d(address: u16, name: &'static str, width: Width, signed: bool, scale: f64, min: f64, max: f64) -> RegisterDescriptor {
    RegisterDescriptor {
        address,
        name,
        width,
        signed,
        scale,
        min,
        max,
    }
}

/// The authoritative register map for the supported inverter family.
///
/// Each group's addresses are contiguous; no address appears twice; every
/// `scale > 0`; every `min <= max`. `validate_register_map` enforces this
/// contract and is exercised by a unit test, per spec §4.2.
pub fn register_map() -> Vec<RegisterGroup> {
    vec![
        RegisterGroup {
            name: "pv",
            start_address: 3000,
            descriptors: vec![
                d(3000, "pv_power_w", Width::Double, false, 1.0, 0.0, 200_000.0),
                d(3002, "pv_daily_kwh", Width::Double, false, 0.01, 0.0, 10_000.0),
            ],
        },
        RegisterGroup {
            name: "battery",
            start_address: 3100,
            descriptors: vec![
                d(3100, "battery_power_w", Width::Double, true, 1.0, -50_000.0, 50_000.0),
                d(3102, "battery_soc_pct", Width::Single, false, 0.1, 0.0, 100.0),
                d(3103, "battery_temp_c", Width::Single, true, 0.1, -40.0, 100.0),
            ],
        },
        RegisterGroup {
            name: "meter",
            start_address: 3200,
            descriptors: vec![
                d(3200, "load_power_w", Width::Double, true, 1.0, -100_000.0, 100_000.0),
                d(3202, "export_power_w", Width::Double, true, 1.0, -100_000.0, 100_000.0),
            ],
        },
    ]
}

/// Errors describing a contract violation in a register map.
#[derive(Debug, PartialEq, Eq)]
pub enum RegisterMapError {
    DuplicateAddress(u16),
    NonContiguousGroup(&'static str),
    InvalidScale(&'static str),
    InvalidRange(&'static str),
}

/// Validates the register-map contract from spec §4.2.
pub fn validate_register_map(groups: &[RegisterGroup]) -> Result<(), RegisterMapError> {
    let mut seen = std::collections::HashSet::new();
    for group in groups {
        let mut expected = group.start_address;
        for desc in &group.descriptors {
            if desc.address != expected {
                return Err(RegisterMapError::NonContiguousGroup(group.name));
            }
            if !seen.insert(desc.address) {
                return Err(RegisterMapError::DuplicateAddress(desc.address));
            }
            if desc.scale <= 0.0 {
                return Err(RegisterMapError::InvalidScale(desc.name));
            }
            if desc.min > desc.max {
                return Err(RegisterMapError::InvalidRange(desc.name));
            }
            expected += desc.word_count();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_register_map_is_valid() {
        assert!(validate_register_map(&register_map()).is_ok());
    }

    #[test]
    fn detects_duplicate_address() {
        let mut groups = register_map();
        groups[0].descriptors[1].address = groups[0].descriptors[0].address;
        assert!(matches!(
            validate_register_map(&groups),
            Err(RegisterMapError::DuplicateAddress(_))
        ));
    }

    #[test]
    fn detects_non_contiguous_group() {
        let mut groups = register_map();
        groups[0].descriptors[1].address += 5;
        assert!(matches!(
            validate_register_map(&groups),
            Err(RegisterMapError::NonContiguousGroup(_))
        ));
    }

    #[test]
    fn detects_invalid_scale() {
        let mut groups = register_map();
        groups[0].descriptors[0].scale = 0.0;
        assert!(matches!(
            validate_register_map(&groups),
            Err(RegisterMapError::InvalidScale(_))
        ));
    }

    #[test]
    fn detects_invalid_range() {
        let mut groups = register_map();
        groups[0].descriptors[0].min = 10.0;
        groups[0].descriptors[0].max = 5.0;
        assert!(matches!(
            validate_register_map(&groups),
            Err(RegisterMapError::InvalidRange(_))
        ));
    }

    #[test]
    fn word_span_matches_descriptor_widths() {
        let groups = register_map();
        let pv = &groups[0];
        assert_eq!(pv.word_span(), 4);
    }
}
