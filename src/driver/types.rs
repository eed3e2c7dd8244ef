//! Shared data types for the driver registry, tick engine and command surface.

use std::collections::HashMap;

/// Lifecycle state of a driver instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Registered but not yet selected as the active vehicle
    Uninitialized,
    /// Selected and receiving ticks/CAN frames
    Active,
    /// Selected but paused (e.g. `vehicle.canwrite` disabled and awaiting config)
    Paused,
    /// Shutting down, no further ticks will be delivered
    ShuttingDown,
}

/// Outcome of dispatching a command to the active driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    Success,
    Fail,
    NotImplemented,
}

/// A generic command sent to the active driver's command surface
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCommand {
    /// Select and initialize a vehicle driver by its registry code
    SetVehicleType(String),
    /// Clear the active vehicle (stop polling, clear `v.type`)
    ClearVehicleType,
    /// Arbitrary named command with string arguments, as the out-of-scope CLI
    /// shell would dispatch it (e.g. "homelink", "wakeup", "lock")
    Generic { name: String, args: Vec<String> },
}

/// Debounced charge-state label, used both by the reactor and the stat formatter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeState {
    Charging,
    TopOff,
    Done,
    Preparing,
    Heating,
    Stopped,
}

impl ChargeState {
    /// Internal code, as stored in the `v.c.state` metric
    pub fn code(self) -> &'static str {
        match self {
            ChargeState::Charging => "charging",
            ChargeState::TopOff => "topoff",
            ChargeState::Done => "done",
            ChargeState::Preparing => "preparing",
            ChargeState::Heating => "heating",
            ChargeState::Stopped => "stopped",
        }
    }

    /// Parse a charge-state code back into its enum, if recognized
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "charging" => Some(ChargeState::Charging),
            "topoff" => Some(ChargeState::TopOff),
            "done" => Some(ChargeState::Done),
            "preparing" => Some(ChargeState::Preparing),
            "heating" => Some(ChargeState::Heating),
            "stopped" => Some(ChargeState::Stopped),
            _ => None,
        }
    }

    /// Human-readable label used by the stat formatter,
    /// following the capitalization table in `CommandStat`.
    pub fn label(self) -> &'static str {
        match self {
            ChargeState::Charging => "Charging",
            ChargeState::TopOff => "Topping off",
            ChargeState::Done => "Charge Done",
            ChargeState::Preparing => "Preparing",
            ChargeState::Heating => "Charging, Heating",
            ChargeState::Stopped => "Charge Stopped",
        }
    }
}

/// 12V battery monitor state
#[derive(Debug, Clone, Copy, Default)]
pub struct TwelveVMonitor {
    /// Debounce ticker: +2/tick while charging12v, -1/tick otherwise, capped
    /// at 900 (15 min) and floored at 0.
    pub ticker: u16,
    /// Reference ("at rest") voltage latched the instant the ticker reaches 0
    pub vref: f32,
    /// Whether a critical alert is currently latched
    pub alert_active: bool,
}

/// Emitted by `TwelveVMonitor::tick` when the alert state changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwelveVEvent {
    Critical,
    Recovered,
}

const TWELVE_V_TICKER_CAP: u16 = 900;
const TWELVE_V_HYSTERESIS_FACTOR: f32 = 0.6;

impl TwelveVMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directly set the reference ("at rest") voltage, e.g. from an
    /// externally-supplied `v.bat.12v.voltage_ref` metric at startup.
    pub fn set_vref(&mut self, vref: f32) {
        self.vref = vref;
    }

    pub fn vref(&self) -> f32 {
        self.vref
    }

    /// Raise the ticker to at least `min`, without lowering it (seeded to
    /// at least 30 when `env.charging12v` turns on).
    pub fn seed_ticker_at_least(&mut self, min: u16) {
        self.ticker = self.ticker.max(min.min(TWELVE_V_TICKER_CAP));
    }

    /// Advance the monitor by one tick. `charging12v` reflects whether the
    /// alternator/DC-DC converter is currently topping up the 12V battery;
    /// `voltage` is the latest 12V rail reading; `alert_threshold` is
    /// `vehicle.12v.alert` from config; `tick_counter` is the tick-engine's
    /// free-running counter, checked only when `tick_counter % 60 == 0`.
    pub fn tick(
        &mut self,
        charging12v: bool,
        voltage: f32,
        alert_threshold: f32,
        tick_counter: u32,
    ) -> Option<TwelveVEvent> {
        let was_positive = self.ticker > 0;
        if charging12v {
            self.ticker = (self.ticker + 2).min(TWELVE_V_TICKER_CAP);
        } else {
            self.ticker = self.ticker.saturating_sub(1);
        }

        // Latch only on the transition from a positive ticker down to zero,
        // not on every tick the ticker happens to already sit at zero.
        if was_positive && self.ticker == 0 {
            self.vref = voltage;
        }

        if tick_counter % 60 != 0 || self.ticker != 0 {
            return None;
        }

        let drop = self.vref - voltage;
        if !self.alert_active && drop >= alert_threshold {
            self.alert_active = true;
            return Some(TwelveVEvent::Critical);
        }
        if self.alert_active && drop <= alert_threshold * TWELVE_V_HYSTERESIS_FACTOR {
            self.alert_active = false;
            return Some(TwelveVEvent::Recovered);
        }
        None
    }
}

/// Accumulated drive/park/charge duration counters
#[derive(Debug, Clone, Copy, Default)]
pub struct DriveAccumulators {
    pub drive_seconds: u64,
    pub park_seconds: u64,
    pub charge_seconds: u64,
}

/// Charge mode selected on the vehicle (the `charge mode` command)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeMode {
    Standard,
    Storage,
    Range,
    Performance,
}

impl ChargeMode {
    pub fn code(self) -> &'static str {
        match self {
            ChargeMode::Standard => "standard",
            ChargeMode::Storage => "storage",
            ChargeMode::Range => "range",
            ChargeMode::Performance => "performance",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "standard" => Some(ChargeMode::Standard),
            "storage" => Some(ChargeMode::Storage),
            "range" => Some(ChargeMode::Range),
            "performance" => Some(ChargeMode::Performance),
            _ => None,
        }
    }

    /// Capitalized label used by the stat formatter
    pub fn label(self) -> &'static str {
        match self {
            ChargeMode::Standard => "Standard",
            ChargeMode::Storage => "Storage",
            ChargeMode::Range => "Range",
            ChargeMode::Performance => "Performance",
        }
    }
}

/// Point-in-time snapshot of everything the stat formatter and the web
/// surface need to render, independent of the concrete driver implementation.
#[derive(Debug, Clone, Default)]
pub struct VehicleSnapshot {
    pub vehicle_type: Option<String>,
    pub driving: bool,
    pub chargeport_open: bool,
    pub charge_mode: Option<ChargeMode>,
    pub charge_state: Option<ChargeState>,
    pub charge_voltage: Option<f32>,
    pub charge_current: Option<f32>,
    pub duration_full_mins: Option<u32>,
    pub duration_range_mins: Option<u32>,
    pub duration_soc_mins: Option<u32>,
    pub soc_percent: Option<f32>,
    pub charge_limit_soc: Option<f32>,
    pub charge_limit_range_km: Option<f32>,
    pub ideal_range_km: Option<f32>,
    pub est_range_km: Option<f32>,
    pub range_km: Option<f32>,
    pub odometer_km: Option<f32>,
    pub cac: Option<f32>,
    pub soh_percent: Option<f32>,
    pub twelve_v_voltage: Option<f32>,
    pub accumulators: DriveAccumulators,
    pub extra: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charge_state_label_table() {
        assert_eq!(ChargeState::Charging.label(), "Charging");
        assert_eq!(ChargeState::TopOff.label(), "Topping off");
        assert_eq!(ChargeState::Done.label(), "Charge Done");
        assert_eq!(ChargeState::Preparing.label(), "Preparing");
        assert_eq!(ChargeState::Heating.label(), "Charging, Heating");
        assert_eq!(ChargeState::Stopped.label(), "Charge Stopped");
    }

    #[test]
    fn charge_state_round_trips_through_code() {
        for state in [
            ChargeState::Charging,
            ChargeState::TopOff,
            ChargeState::Done,
            ChargeState::Preparing,
            ChargeState::Heating,
            ChargeState::Stopped,
        ] {
            assert_eq!(ChargeState::from_code(state.code()), Some(state));
        }
    }

    #[test]
    fn twelve_v_ticker_caps_and_floors() {
        let mut monitor = TwelveVMonitor::new();
        for _ in 0..500 {
            monitor.tick(true, 12.6, 1.6, 1);
        }
        assert_eq!(monitor.ticker, 900);

        for _ in 0..500 {
            monitor.tick(false, 12.6, 1.6, 1);
        }
        assert_eq!(monitor.ticker, 0);
    }

    #[test]
    fn twelve_v_alert_fires_and_clears_with_hysteresis() {
        let mut monitor = TwelveVMonitor::new();
        monitor.set_vref(12.6);

        // Voltage sags 2.0V below vref, checked at T=60 while ticker stays 0.
        let event = monitor.tick(false, 10.6, 1.6, 60);
        assert_eq!(event, Some(TwelveVEvent::Critical));

        // Recovers to within 0.6x threshold of vref.
        let event = monitor.tick(false, 12.0, 1.6, 120);
        assert_eq!(event, Some(TwelveVEvent::Recovered));
    }

    #[test]
    fn vref_latches_only_on_transition_from_positive_to_zero() {
        let mut monitor = TwelveVMonitor::new();
        monitor.set_vref(12.8);
        // ticker goes 0 -> positive while charging
        monitor.tick(true, 13.0, 1.6, 1);
        assert!(monitor.ticker > 0);
        // then counts back down to exactly zero: vref latches to the
        // voltage observed at that instant, not every tick along the way
        while monitor.ticker > 1 {
            monitor.tick(false, 11.0, 1.6, 1);
        }
        monitor.tick(false, 9.5, 1.6, 1);
        assert_eq!(monitor.ticker, 0);
        assert!((monitor.vref - 9.5).abs() < f32::EPSILON);
    }
}
