//! Stat formatter
//!
//! Produces the textual "stat" summary (charge mode & state, SOC, ranges,
//! odometer) from a `VehicleSnapshot`, with a small lookup table mapping
//! internal charge-state codes to human-readable labels.

use std::fmt::Write as _;

use super::types::{ChargeState, VehicleSnapshot};
use crate::config::Config;

/// Whether `config.vehicle.units_distance` selects miles over kilometres.
fn uses_miles(config: &Config) -> bool {
    config.vehicle.units_distance.eq_ignore_ascii_case("miles")
        || config.vehicle.units_distance.eq_ignore_ascii_case("m")
}

const KM_PER_MILE: f32 = 1.609_344;

fn render_distance(km: f32, miles: bool) -> String {
    if miles {
        format!("{:.1} mi", km / KM_PER_MILE)
    } else {
        format!("{:.1} km", km)
    }
}

/// Render the full stat summary for `snapshot`.
pub fn format_stat(snapshot: &VehicleSnapshot, config: &Config) -> String {
    let miles = uses_miles(config);
    let mut out = String::new();

    if snapshot.chargeport_open {
        let mode_label = snapshot.charge_mode.map_or("Unknown", |m| m.label());
        let state = snapshot.charge_state;
        let state_label = state.map_or("Unknown", |s| s.label());
        let _ = writeln!(out, "{mode_label} - {state_label}");

        let still_charging = !matches!(state, Some(ChargeState::Done) | Some(ChargeState::Stopped));
        if still_charging {
            if let (Some(v), Some(a)) = (snapshot.charge_voltage, snapshot.charge_current) {
                let _ = writeln!(out, "{v:.1}V/{a:.1}A");
            }
            if let Some(mins) = snapshot.duration_full_mins.filter(|m| *m != 0) {
                let _ = writeln!(out, "Full: {mins} mins");
            }
            if let Some(mins) = snapshot.duration_range_mins.filter(|m| *m != 0) {
                match snapshot.charge_limit_range_km {
                    Some(limit) => {
                        let _ = writeln!(out, "Range ({}): {mins} mins", render_distance(limit, miles));
                    }
                    None => {
                        let _ = writeln!(out, "Range: {mins} mins");
                    }
                }
            }
            if let Some(mins) = snapshot.duration_soc_mins.filter(|m| *m != 0) {
                match snapshot.charge_limit_soc {
                    Some(limit) => {
                        let _ = writeln!(out, "SOC ({limit:.0}%): {mins} mins");
                    }
                    None => {
                        let _ = writeln!(out, "SOC: {mins} mins");
                    }
                }
            }
        }
    } else {
        let _ = writeln!(out, "Not charging");
    }

    match snapshot.soc_percent {
        Some(soc) => {
            let _ = writeln!(out, "SOC: {soc:.1}%");
        }
        None => {
            let _ = writeln!(out, "SOC: -");
        }
    }

    if let Some(km) = snapshot.ideal_range_km {
        let _ = writeln!(out, "Ideal range: {}", render_distance(km, miles));
    }
    if let Some(km) = snapshot.est_range_km {
        let _ = writeln!(out, "Est. range: {}", render_distance(km, miles));
    }
    if let Some(km) = snapshot.odometer_km {
        let _ = writeln!(out, "ODO: {}", render_distance(km, miles));
    }
    if let Some(cac) = snapshot.cac {
        let _ = writeln!(out, "CAC: {cac:.1}Ah");
    }
    if let Some(soh) = snapshot.soh_percent {
        let _ = writeln!(out, "SOH: {soh:.0}%");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::types::ChargeMode;

    #[test]
    fn not_charging_when_chargeport_closed() {
        let snap = VehicleSnapshot {
            soc_percent: Some(77.0),
            ..Default::default()
        };
        let out = format_stat(&snap, &Config::default());
        assert!(out.starts_with("Not charging\n"));
        assert!(out.contains("SOC: 77.0%"));
    }

    #[test]
    fn charging_scenario_renders_voltage_current_and_duration() {
        let snap = VehicleSnapshot {
            chargeport_open: true,
            charge_mode: Some(ChargeMode::Range),
            charge_state: Some(ChargeState::Charging),
            charge_voltage: Some(230.0),
            charge_current: Some(16.0),
            duration_full_mins: Some(120),
            soc_percent: Some(42.0),
            ..Default::default()
        };
        let out = format_stat(&snap, &Config::default());
        assert!(out.starts_with("Range - Charging\n230.0V/16.0A\nFull: 120 mins\n"));
        assert!(out.contains("SOC: 42.0%"));
    }

    #[test]
    fn done_state_suppresses_voltage_and_durations() {
        let snap = VehicleSnapshot {
            chargeport_open: true,
            charge_mode: Some(ChargeMode::Standard),
            charge_state: Some(ChargeState::Done),
            charge_voltage: Some(230.0),
            charge_current: Some(0.0),
            duration_full_mins: Some(5),
            soc_percent: Some(100.0),
            ..Default::default()
        };
        let out = format_stat(&snap, &Config::default());
        assert_eq!(out, "Standard - Charge Done\nSOC: 100.0%\n");
    }

    #[test]
    fn distance_unit_follows_config() {
        let snap = VehicleSnapshot {
            odometer_km: Some(160.9344),
            ..Default::default()
        };
        let mut config = Config::default();
        config.vehicle.units_distance = "miles".to_string();
        let out = format_stat(&snap, &config);
        assert!(out.contains("ODO: 100.0 mi"));
    }
}
