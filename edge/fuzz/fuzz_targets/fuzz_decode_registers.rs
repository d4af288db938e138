#![no_main]
use libfuzzer_sys::fuzz_target;
use telemetry_edge::registers::{register_map, Width};

fuzz_target!(|data: &[u8]| {
    // Interpret the input as a u16 register stream in big-endian pairs and
    // exercise the single/double-word decode paths with varying lengths.
    let mut words = Vec::new();
    for chunk in data.chunks_exact(2) {
        words.push(u16::from_be_bytes([chunk[0], chunk[1]]));
    }

    for group in register_map() {
        for desc in group.descriptors {
            let needed = match desc.width {
                Width::Single => 1,
                Width::Double => 2,
            };
            if words.len() >= needed {
                let _ = telemetry_edge::modbus_client::encode_descriptor_words(
                    desc.width,
                    desc.signed,
                    words[0] as i64,
                );
            }
        }
    }
});
