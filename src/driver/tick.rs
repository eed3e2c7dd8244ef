//! Periodic tick engine and derived-state machine
//!
//! Consumes a 1 Hz heartbeat (driven by `tokio::time::interval` in
//! `driver::runtime`), fans it out to the driver's decadal tickers, and
//! drives the drive/park/charge time accumulators, efficiency smoothing and
//! the 12V battery monitor.

use super::types::{DriveAccumulators, TwelveVEvent, TwelveVMonitor};

/// Inputs the tick engine reads from the metric store on every 1 Hz tick
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInputs {
    /// `v.env.on`
    pub env_on: bool,
    /// `v.c.inprogress`
    pub charge_inprogress: bool,
    /// `v.env.charging12v`
    pub charging_12v: bool,
    /// `v.bat.12v.voltage`
    pub voltage_12v: f32,
    /// `vehicle.12v.alert` from config
    pub alert_threshold_12v: f32,
    /// `v.p.speed`
    pub speed: f32,
    /// `v.b.power`
    pub power: f32,
}

/// What fired on this tick, for the caller (`driver::runtime`) to act on
#[derive(Debug, Clone, Copy)]
pub struct TickFired {
    pub master_tick: u64,
    pub ticker_10: bool,
    pub ticker_60: bool,
    pub ticker_300: bool,
    pub ticker_600: bool,
    pub ticker_3600: bool,
    /// Smoothed consumption metric, `(4*prev + c) / 5`
    pub efficiency: f32,
    pub twelve_v_event: Option<TwelveVEvent>,
}

/// Multi-rate tickers, accumulators, efficiency smoothing and the 12V
/// monitor, all driven from one 1 Hz heartbeat.
#[derive(Debug, Default)]
pub struct TickEngine {
    master_tick: u64,
    accumulators: DriveAccumulators,
    smoothed_consumption: f32,
    twelve_v: TwelveVMonitor,
}

impl TickEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn master_tick(&self) -> u64 {
        self.master_tick
    }

    pub fn accumulators(&self) -> DriveAccumulators {
        self.accumulators
    }

    pub fn smoothed_consumption(&self) -> f32 {
        self.smoothed_consumption
    }

    pub fn twelve_v(&self) -> &TwelveVMonitor {
        &self.twelve_v
    }

    /// Seed the 12V monitor's reference voltage, e.g. from a persisted
    /// `v.bat.12v.voltage_ref` metric read back at startup.
    pub fn set_vref_12v(&mut self, vref: f32) {
        self.twelve_v.set_vref(vref);
    }

    /// Mutable access to the 12V monitor, used by the reactor to seed the
    /// calm-down ticker when `env.charging12v` turns on.
    pub fn twelve_v_mut(&mut self) -> &mut TwelveVMonitor {
        &mut self.twelve_v
    }

    /// Advance by one 1 Hz tick. The poller send-side and the driver's own
    /// decadal hooks are invoked by the caller using the flags on the
    /// returned `TickFired`.
    pub fn tick(&mut self, inputs: &TickInputs) -> TickFired {
        self.master_tick += 1;

        if inputs.env_on {
            self.accumulators.park_seconds = 0;
            self.accumulators.drive_seconds += 1;
        } else {
            self.accumulators.drive_seconds = 0;
            self.accumulators.park_seconds += 1;
        }

        if inputs.charge_inprogress {
            self.accumulators.charge_seconds += 1;
        } else {
            self.accumulators.charge_seconds = 0;
        }

        let instantaneous = if inputs.speed < 5.0 {
            0.0
        } else {
            inputs.power / inputs.speed
        };
        self.smoothed_consumption = (4.0 * self.smoothed_consumption + instantaneous) / 5.0;

        let tick_counter_u32 = (self.master_tick % u64::from(u32::MAX)) as u32;
        let twelve_v_event = self.twelve_v.tick(
            inputs.charging_12v,
            inputs.voltage_12v,
            inputs.alert_threshold_12v,
            tick_counter_u32,
        );

        TickFired {
            master_tick: self.master_tick,
            ticker_10: self.master_tick % 10 == 0,
            ticker_60: self.master_tick % 60 == 0,
            ticker_300: self.master_tick % 300 == 0,
            ticker_600: self.master_tick % 600 == 0,
            ticker_3600: self.master_tick % 3600 == 0,
            efficiency: self.smoothed_consumption,
            twelve_v_event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(env_on: bool) -> TickInputs {
        TickInputs {
            env_on,
            ..Default::default()
        }
    }

    #[test]
    fn drive_park_counters_track_on_off_transitions() {
        let mut engine = TickEngine::new();
        for _ in 0..5 {
            engine.tick(&inputs(true));
        }
        assert_eq!(engine.accumulators().drive_seconds, 5);
        assert_eq!(engine.accumulators().park_seconds, 0);

        for _ in 0..3 {
            engine.tick(&inputs(false));
        }
        assert_eq!(engine.accumulators().drive_seconds, 0);
        assert_eq!(engine.accumulators().park_seconds, 3);
    }

    #[test]
    fn charge_time_accumulates_only_while_charging() {
        let mut engine = TickEngine::new();
        let mut tick_charging = inputs(false);
        tick_charging.charge_inprogress = true;
        engine.tick(&tick_charging);
        engine.tick(&tick_charging);
        assert_eq!(engine.accumulators().charge_seconds, 2);

        engine.tick(&inputs(false));
        assert_eq!(engine.accumulators().charge_seconds, 0);
    }

    #[test]
    fn efficiency_is_zero_below_5_kph() {
        let mut engine = TickEngine::new();
        let mut tick_inputs = inputs(true);
        tick_inputs.speed = 4.9;
        tick_inputs.power = 50.0;
        let fired = engine.tick(&tick_inputs);
        assert_eq!(fired.efficiency, 0.0);
    }

    #[test]
    fn twelve_v_alert_raises_and_clears_with_hysteresis() {
        let mut engine = TickEngine::new();
        engine.set_vref_12v(12.8);
        let mut tick_inputs = TickInputs {
            voltage_12v: 12.8,
            alert_threshold_12v: 1.6,
            ..Default::default()
        };
        let fired = engine.tick(&tick_inputs);
        assert!(fired.twelve_v_event.is_none());

        tick_inputs.voltage_12v = 11.0;
        for _ in 0..58 {
            engine.tick(&tick_inputs);
        }
        let fired = engine.tick(&tick_inputs);
        assert_eq!(fired.master_tick % 60, 0);
        assert_eq!(fired.twelve_v_event, Some(TwelveVEvent::Critical));

        tick_inputs.voltage_12v = 12.0;
        for _ in 0..59 {
            engine.tick(&tick_inputs);
        }
        let fired = engine.tick(&tick_inputs);
        assert_eq!(fired.twelve_v_event, Some(TwelveVEvent::Recovered));
    }
}
