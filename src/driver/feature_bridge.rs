//! V2 feature bridge
//!
//! The out-of-scope legacy CLI shell addresses a handful of `vehicle.*`
//! config values by small integer keys rather than by name. This module is
//! the read/write seam between that legacy numbering and the named
//! `VehicleConfig` fields it actually maps to.

use crate::config::Config;

const KEY_STREAM: u32 = 8;
const KEY_MINSOC: u32 = 9;
const KEY_CARBITS: u32 = 14;
const KEY_CANWRITE: u32 = 15;

fn bool_to_flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// Read a legacy feature key as its stringified value. Unknown keys read as
/// `"0"`.
pub fn get(config: &Config, key: u32) -> String {
    match key {
        KEY_STREAM => bool_to_flag(config.vehicle.stream).to_string(),
        KEY_MINSOC => config.vehicle.minsoc.to_string(),
        KEY_CARBITS => config.vehicle.carbits.to_string(),
        KEY_CANWRITE => bool_to_flag(config.vehicle.canwrite).to_string(),
        _ => "0".to_string(),
    }
}

/// Write a legacy feature key from its stringified value. Returns whether the
/// write was applied; unknown keys and unparseable values both return `false`
/// without touching `config`.
pub fn set(config: &mut Config, key: u32, value: &str) -> bool {
    match key {
        KEY_STREAM => {
            config.vehicle.stream = value != "0";
            true
        }
        KEY_MINSOC => match value.parse::<u8>() {
            Ok(v) => {
                config.vehicle.minsoc = v;
                true
            }
            Err(_) => false,
        },
        KEY_CARBITS => match value.parse::<u32>() {
            Ok(v) => {
                config.vehicle.carbits = v;
                true
            }
            Err(_) => false,
        },
        KEY_CANWRITE => {
            config.vehicle.canwrite = value != "0";
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_round_trips() {
        let mut config = Config::default();
        assert_eq!(get(&config, KEY_STREAM), "0");
        assert!(set(&mut config, KEY_STREAM, "1"));
        assert_eq!(get(&config, KEY_STREAM), "1");
        assert!(config.vehicle.stream);
    }

    #[test]
    fn minsoc_round_trips_and_rejects_garbage() {
        let mut config = Config::default();
        assert!(set(&mut config, KEY_MINSOC, "42"));
        assert_eq!(get(&config, KEY_MINSOC), "42");
        assert!(!set(&mut config, KEY_MINSOC, "not-a-number"));
        // Rejected write leaves the prior value untouched.
        assert_eq!(get(&config, KEY_MINSOC), "42");
    }

    #[test]
    fn carbits_and_canwrite_round_trip() {
        let mut config = Config::default();
        assert!(set(&mut config, KEY_CARBITS, "1024"));
        assert_eq!(get(&config, KEY_CARBITS), "1024");
        assert!(set(&mut config, KEY_CANWRITE, "1"));
        assert!(config.vehicle.canwrite);
        assert_eq!(get(&config, KEY_CANWRITE), "1");
    }

    #[test]
    fn unknown_key_reads_zero_and_write_returns_false() {
        let mut config = Config::default();
        assert_eq!(get(&config, 99), "0");
        assert!(!set(&mut config, 99, "5"));
    }
}
