//! Core driver abstraction: the registry/factory, the `VehicleDriver` trait
//! every vehicle model implements, and the runtime that ties the CAN
//! reception pipeline, the OBD-II poller, the tick engine and the command
//! surface together.
//!
//! Concrete vehicle-model implementations are explicitly out of scope
//! — this module defines the trait contract and the machinery
//! around it.

use crate::can::CanFrame;
use crate::config::Config;
use crate::events::EventBus;
use crate::metrics::MetricStore;
use crate::obd::{PidDescriptor, PollContext};

pub mod commands;
pub mod feature_bridge;
pub mod reactor;
pub mod registry;
pub mod runtime;
pub mod stat;
pub mod tick;
pub mod types;

pub use types::{
    ChargeMode, ChargeState, CommandResult, DriveAccumulators, DriverCommand, DriverState,
    TwelveVEvent, TwelveVMonitor, VehicleSnapshot,
};

/// The contract every concrete vehicle-model driver implements.
///
/// Method bodies default to `CommandResult::NotImplemented` so a driver only
/// needs to override what it actually supports.
#[async_trait::async_trait]
pub trait VehicleDriver: Send + Sync {
    /// Short registry code, e.g. "NISV" or "TSLA"
    fn code(&self) -> &'static str;

    /// Display name
    fn name(&self) -> &'static str;

    /// PIDs this driver wants polled, in send order
    fn poll_list(&self) -> &[PidDescriptor];

    /// Current eligibility context, derived from the driver's own metrics
    fn poll_context(&self) -> PollContext;

    /// Decode a completed poll reply and update `metrics` accordingly
    fn incoming_poll_reply(&mut self, metrics: &dyn MetricStore, pid: &PidDescriptor, payload: &[u8]);

    /// Handle a CAN frame that wasn't consumed by the OBD-II poller (e.g. a
    /// broadcast status frame the model pushes unprompted)
    fn incoming_frame(&mut self, _metrics: &dyn MetricStore, _frame: &CanFrame) {}

    /// Render a point-in-time snapshot of this driver's state for the stat
    /// formatter and the ambient web surface.
    fn snapshot(&self) -> VehicleSnapshot {
        VehicleSnapshot::default()
    }

    /// Milliseconds to debounce before firing a charge-state-changed
    /// notification; default 0 fires immediately
    fn notify_charge_state_delay(&self, _state: ChargeState) -> u32 {
        0
    }

    async fn command_wakeup(&mut self) -> CommandResult {
        CommandResult::NotImplemented
    }

    async fn command_lock(&mut self, _pin: &str) -> CommandResult {
        CommandResult::NotImplemented
    }

    async fn command_unlock(&mut self, _pin: &str) -> CommandResult {
        CommandResult::NotImplemented
    }

    async fn command_valet(&mut self, _pin: &str) -> CommandResult {
        CommandResult::NotImplemented
    }

    async fn command_unvalet(&mut self, _pin: &str) -> CommandResult {
        CommandResult::NotImplemented
    }

    async fn command_homelink(&mut self, _button_zero_based: u8, _duration_ms: u32) -> CommandResult {
        CommandResult::NotImplemented
    }

    async fn command_charge_mode(&mut self, _mode: &str) -> CommandResult {
        CommandResult::NotImplemented
    }

    async fn command_charge_start(&mut self) -> CommandResult {
        CommandResult::NotImplemented
    }

    async fn command_charge_stop(&mut self) -> CommandResult {
        CommandResult::NotImplemented
    }

    async fn command_charge_current(&mut self, _amps: u32) -> CommandResult {
        CommandResult::NotImplemented
    }

    async fn command_charge_cooldown(&mut self) -> CommandResult {
        CommandResult::NotImplemented
    }

    /// Called once the 12V monitor latches a critical alert
    fn on_12v_critical(&mut self, _events: &dyn EventBus) {}

    /// Called once the 12V monitor clears a previously-latched alert
    fn on_12v_recovered(&mut self, _events: &dyn EventBus) {}

    // --- Metric-reactor hooks ---
    // All default to no-ops; a concrete model overrides only what it cares
    // to react to locally (e.g. flashing a dash light on lock/unlock).

    fn on_vehicle_on(&mut self) {}
    fn on_vehicle_off(&mut self) {}
    fn on_vehicle_awake(&mut self) {}
    fn on_vehicle_asleep(&mut self) {}
    fn on_charge_start(&mut self) {}
    fn on_charge_stop(&mut self) {}
    fn on_charge_prepare(&mut self) {}
    fn on_charge_finish(&mut self) {}
    fn on_charge_pilot_on(&mut self) {}
    fn on_charge_pilot_off(&mut self) {}
    fn on_charge_12v_start(&mut self) {}
    fn on_charge_12v_stop(&mut self) {}
    fn on_locked(&mut self) {}
    fn on_unlocked(&mut self) {}
    fn on_valet_on(&mut self) {}
    fn on_valet_off(&mut self) {}
    fn on_headlights_on(&mut self) {}
    fn on_headlights_off(&mut self) {}
    fn on_alarm_on(&mut self) {}
    fn on_alarm_off(&mut self) {}
    fn on_charge_mode_changed(&mut self, _mode: &str) {}
    fn on_charge_state_changed(&mut self, _state: ChargeState) {}

    // --- Periodic tickers, all default to no-ops ---

    /// Invoked every tick, unconditionally
    fn ticker_1(&mut self, _metrics: &dyn MetricStore, _master_tick: u64) {}
    /// Invoked when `master_tick % 10 == 0`
    fn ticker_10(&mut self, _metrics: &dyn MetricStore, _master_tick: u64) {}
    /// Invoked when `master_tick % 60 == 0`
    fn ticker_60(&mut self, _metrics: &dyn MetricStore, _master_tick: u64) {}
    /// Invoked when `master_tick % 300 == 0`
    fn ticker_300(&mut self, _metrics: &dyn MetricStore, _master_tick: u64) {}
    /// Invoked when `master_tick % 600 == 0`
    fn ticker_600(&mut self, _metrics: &dyn MetricStore, _master_tick: u64) {}
    /// Invoked when `master_tick % 3600 == 0`
    fn ticker_3600(&mut self, _metrics: &dyn MetricStore, _master_tick: u64) {}
}

/// Apply the active config to a freshly-selected driver. Placeholder seam for
/// drivers that need config-derived setup (e.g. `vehicle.minsoc`); most
/// drivers won't need to override anything here.
pub fn configure_driver(_driver: &mut dyn VehicleDriver, _config: &Config) {}

/// A minimal fixture driver used by this crate's own unit and integration
/// tests. Concrete vehicle-model drivers are out of scope; this
/// exists only so the registry, tick engine and command surface have
/// something real to exercise in tests, in-crate and in `tests/*.rs`.
pub mod testing {
    use super::*;
    use crate::metrics::MetricValue;
    use crate::obd::PollKind;

    const FIXTURE_POLL_LIST: &[PidDescriptor] = &[PidDescriptor {
        name: "speed",
        kind: PollKind::Current,
        tx_module_id: 0,
        rx_module_id: 0,
        pid: 0x0d,
        poll_period: [1, 1, 1, 1],
    }];

    pub struct FixtureDriver {
        pub driving: bool,
        pub wakeups: u32,
        pub last_pin_checked: Option<String>,
        pub locked: bool,
    }

    impl FixtureDriver {
        pub fn new() -> Self {
            Self {
                driving: false,
                wakeups: 0,
                last_pin_checked: None,
                locked: false,
            }
        }
    }

    impl Default for FixtureDriver {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait::async_trait]
    impl VehicleDriver for FixtureDriver {
        fn code(&self) -> &'static str {
            "FIX"
        }

        fn name(&self) -> &'static str {
            "Fixture Vehicle"
        }

        fn poll_list(&self) -> &[PidDescriptor] {
            FIXTURE_POLL_LIST
        }

        fn poll_context(&self) -> PollContext {
            PollContext {
                state: usize::from(self.driving),
            }
        }

        fn incoming_poll_reply(
            &mut self,
            metrics: &dyn MetricStore,
            pid: &PidDescriptor,
            payload: &[u8],
        ) {
            if pid.name == "speed" && !payload.is_empty() {
                metrics.set("v.p.speed", MetricValue::Int(i64::from(payload[0])));
            }
        }

        async fn command_wakeup(&mut self) -> CommandResult {
            self.wakeups += 1;
            CommandResult::Success
        }

        async fn command_lock(&mut self, pin: &str) -> CommandResult {
            self.last_pin_checked = Some(pin.to_string());
            self.locked = true;
            CommandResult::Success
        }

        async fn command_unlock(&mut self, pin: &str) -> CommandResult {
            self.last_pin_checked = Some(pin.to_string());
            self.locked = false;
            CommandResult::Success
        }
    }
}
