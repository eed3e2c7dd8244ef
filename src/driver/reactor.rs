//! Metric-change reactor
//!
//! Subscribes to every metric, matches the specific metric object on each
//! change, and turns meaningful transitions into semantic events, driver
//! hooks and best-effort notifications. Charge-state changes are debounced
//! per `VehicleDriver::notify_charge_state_delay`; everything else fires
//! immediately.

use std::collections::HashMap;
use std::sync::Arc;

use super::VehicleDriver;
use super::stat::format_stat;
use super::types::{ChargeState, TwelveVEvent};
use crate::config::Config;
use crate::events::{EventBus, VehicleEvent};
use crate::metrics::{MetricChange, MetricStore, MetricValue};
use crate::notify::{Notification, NotificationService};

/// A charge-state change waiting out its debounce delay
struct PendingChargeState {
    state: ChargeState,
    ticks_remaining: u32,
}

/// Request to seed the 12V monitor's calm-down ticker, returned by
/// `observe_metric_change` when `env.charging12v` transitions on (the
/// ticker is seeded to at least 30 so the alert check stays quiet while the
/// charger settles). The caller (`driver::runtime`) applies it to the tick
/// engine, which owns the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwelveVSeedRequest {
    pub min_ticker: u16,
}

fn bool_value(value: &MetricValue) -> bool {
    match value {
        MetricValue::Bool(b) => *b,
        MetricValue::Int(i) => *i != 0,
        MetricValue::Float(f) => *f != 0.0,
        MetricValue::Str(s) => !s.is_empty() && s != "0" && s != "false",
    }
}

/// Reacts to metric/state transitions and fans them out to the event bus and
/// notification service.
pub struct Reactor {
    event_bus: Arc<dyn EventBus>,
    notify: Arc<dyn NotificationService>,
    config: Arc<Config>,
    last_bool: HashMap<String, bool>,
    last_charge_mode: Option<String>,
    last_charge_state: Option<ChargeState>,
    scheduled_stop: bool,
    valet_active: bool,
    pending: Option<PendingChargeState>,
}

impl Reactor {
    pub fn new(
        event_bus: Arc<dyn EventBus>,
        notify: Arc<dyn NotificationService>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            event_bus,
            notify,
            config,
            last_bool: HashMap::new(),
            last_charge_mode: None,
            last_charge_state: None,
            scheduled_stop: false,
            valet_active: false,
            pending: None,
        }
    }

    /// Records the new value for `name` and returns `Some(new_value)` only if
    /// it differs from what was last observed (or nothing was observed yet).
    fn transitioned(&mut self, name: &str, new_value: bool) -> Option<bool> {
        match self.last_bool.insert(name.to_string(), new_value) {
            Some(old) if old == new_value => None,
            _ => Some(new_value),
        }
    }

    async fn publish(&self, event: VehicleEvent) {
        self.event_bus.publish(event);
    }

    async fn notify_info(&self, subtype: &'static str, body: impl Into<String>) {
        let _ = self.notify.notify(&Notification::info(subtype, body)).await;
    }

    async fn notify_alert(&self, subtype: &'static str, body: impl Into<String>) {
        let _ = self.notify.notify(&Notification::alert(subtype, body)).await;
    }

    /// Dispatch one metric change against the metric-reactor's reaction
    /// table. Returns a 12V-ticker seed request when one is warranted; the caller
    /// forwards it to the tick engine.
    pub async fn observe_metric_change(
        &mut self,
        driver: &mut dyn VehicleDriver,
        metrics: &dyn MetricStore,
        change: &MetricChange,
    ) -> Option<TwelveVSeedRequest> {
        match change.name.as_str() {
            "v.env.on" => {
                if let Some(on) = self.transitioned("v.env.on", bool_value(&change.value)) {
                    if on {
                        self.publish(VehicleEvent::VehicleOn).await;
                        driver.on_vehicle_on();
                    } else {
                        self.publish(VehicleEvent::VehicleOff).await;
                        driver.on_vehicle_off();
                    }
                }
                None
            }
            "v.env.awake" => {
                if let Some(awake) = self.transitioned("v.env.awake", bool_value(&change.value)) {
                    if awake {
                        self.publish(VehicleEvent::VehicleAwake).await;
                        driver.on_vehicle_awake();
                    } else {
                        self.publish(VehicleEvent::VehicleAsleep).await;
                        driver.on_vehicle_asleep();
                    }
                }
                None
            }
            "v.c.inprogress" => {
                if let Some(charging) =
                    self.transitioned("v.c.inprogress", bool_value(&change.value))
                {
                    if charging {
                        self.publish(VehicleEvent::ChargeStarted).await;
                        driver.on_charge_start();
                    } else {
                        self.publish(VehicleEvent::ChargeStopped).await;
                        driver.on_charge_stop();
                    }
                }
                None
            }
            "v.d.chargeport" => {
                if let Some(open) = self.transitioned("v.d.chargeport", bool_value(&change.value))
                {
                    if open {
                        self.publish(VehicleEvent::ChargePrepare).await;
                        driver.on_charge_prepare();
                    } else {
                        self.publish(VehicleEvent::ChargeFinish).await;
                        driver.on_charge_finish();
                    }
                }
                None
            }
            "v.c.pilot" => {
                if let Some(on) = self.transitioned("v.c.pilot", bool_value(&change.value)) {
                    if on {
                        self.publish(VehicleEvent::ChargePilotOn).await;
                        driver.on_charge_pilot_on();
                    } else {
                        self.publish(VehicleEvent::ChargePilotOff).await;
                        driver.on_charge_pilot_off();
                    }
                }
                None
            }
            "v.env.charging12v" => {
                let on = bool_value(&change.value);
                let mut seed = None;
                if let Some(on) = self.transitioned("v.env.charging12v", on) {
                    if on {
                        self.publish(VehicleEvent::Charge12vStart).await;
                        driver.on_charge_12v_start();
                        seed = Some(TwelveVSeedRequest { min_ticker: 30 });
                    } else {
                        self.publish(VehicleEvent::Charge12vStop).await;
                        driver.on_charge_12v_stop();
                    }
                }
                seed
            }
            "v.env.locked" => {
                if let Some(locked) = self.transitioned("v.env.locked", bool_value(&change.value))
                {
                    if locked {
                        self.publish(VehicleEvent::Locked).await;
                        driver.on_locked();
                    } else {
                        self.publish(VehicleEvent::Unlocked).await;
                        driver.on_unlocked();
                    }
                }
                None
            }
            "v.env.valet" => {
                let active = bool_value(&change.value);
                self.valet_active = active;
                if let Some(on) = self.transitioned("v.env.valet", active) {
                    if on {
                        self.publish(VehicleEvent::ValetOn).await;
                        driver.on_valet_on();
                        self.notify_info("valet.enabled", "Valet mode enabled").await;
                    } else {
                        self.publish(VehicleEvent::ValetOff).await;
                        driver.on_valet_off();
                        self.notify_info("valet.disabled", "Valet mode disabled").await;
                    }
                }
                None
            }
            "v.env.headlights" => {
                if let Some(on) =
                    self.transitioned("v.env.headlights", bool_value(&change.value))
                {
                    if on {
                        self.publish(VehicleEvent::HeadlightsOn).await;
                        driver.on_headlights_on();
                    } else {
                        self.publish(VehicleEvent::HeadlightsOff).await;
                        driver.on_headlights_off();
                    }
                }
                None
            }
            "v.d.hood" => {
                if self.transitioned("v.d.hood", bool_value(&change.value)) == Some(true)
                    && self.valet_active
                {
                    self.notify_alert("valet.hood", "Hood opened").await;
                }
                None
            }
            "v.d.trunk" => {
                if self.transitioned("v.d.trunk", bool_value(&change.value)) == Some(true)
                    && self.valet_active
                {
                    self.notify_alert("valet.trunk", "Trunk opened").await;
                }
                None
            }
            "v.env.alarm" => {
                if let Some(on) = self.transitioned("v.env.alarm", bool_value(&change.value)) {
                    if on {
                        self.publish(VehicleEvent::AlarmOn).await;
                        driver.on_alarm_on();
                        self.notify_alert("alarm.sounding", "Alarm sounding").await;
                    } else {
                        self.publish(VehicleEvent::AlarmOff).await;
                        driver.on_alarm_off();
                        self.notify_info("alarm.stopped", "Alarm stopped").await;
                    }
                }
                None
            }
            "v.c.mode" => {
                if let Some(mode) = change.value.as_str() {
                    if self.last_charge_mode.as_deref() != Some(mode) {
                        self.last_charge_mode = Some(mode.to_string());
                        self.publish(VehicleEvent::ChargeModeChanged {
                            mode: mode.to_string(),
                        })
                        .await;
                        driver.on_charge_mode_changed(mode);
                    }
                }
                None
            }
            "v.c.substate" => {
                self.scheduled_stop = change.value.as_str() == Some("scheduledstop");
                None
            }
            "v.c.state" => {
                if let Some(code) = change.value.as_str() {
                    if let Some(state) = ChargeState::from_code(code) {
                        self.observe_charge_state(driver, metrics, state).await;
                    }
                }
                None
            }
            _ => None,
        }
    }

    fn event_for_charge_state(state: ChargeState) -> VehicleEvent {
        match state {
            ChargeState::Charging | ChargeState::TopOff | ChargeState::Heating => {
                VehicleEvent::ChargeStarted
            }
            ChargeState::Done => VehicleEvent::ChargeDone,
            ChargeState::Preparing | ChargeState::Stopped => VehicleEvent::ChargeStopped,
        }
    }

    /// Fire the charge-state notifier: publish the semantic event, deliver
    /// the notification with the stat body, and reset the duration metrics
    /// once the state settles.
    async fn fire_charge_state(
        &mut self,
        driver: &mut dyn VehicleDriver,
        metrics: &dyn MetricStore,
        state: ChargeState,
    ) {
        let event = Self::event_for_charge_state(state);
        self.publish(event).await;

        let body = format_stat(&driver.snapshot(), &self.config);
        match state {
            ChargeState::Charging | ChargeState::TopOff => {
                self.notify_info("charge.started", body).await;
            }
            ChargeState::Heating => {
                self.notify_info("charge.heating", body).await;
            }
            ChargeState::Done => {
                self.notify_info("charge.done", body).await;
                reset_charge_durations(metrics);
            }
            ChargeState::Preparing | ChargeState::Stopped => {
                if self.scheduled_stop {
                    self.notify_info("charge.stopped", body).await;
                } else {
                    self.notify_alert("charge.stopped", body).await;
                }
                reset_charge_durations(metrics);
            }
        }
    }

    /// Observe a new `v.c.state` value. Debounces according to
    /// `driver.notify_charge_state_delay`, measured in whole ticks at the
    /// tick engine's 1 Hz cadence.
    pub async fn observe_charge_state(
        &mut self,
        driver: &mut dyn VehicleDriver,
        metrics: &dyn MetricStore,
        new_state: ChargeState,
    ) {
        if self.last_charge_state == Some(new_state) {
            return;
        }
        self.last_charge_state = Some(new_state);
        self.publish(VehicleEvent::ChargeStateChanged {
            state: new_state.code().to_string(),
        })
        .await;
        driver.on_charge_state_changed(new_state);

        let delay_ms = driver.notify_charge_state_delay(new_state);
        if delay_ms == 0 {
            self.pending = None;
            self.fire_charge_state(driver, metrics, new_state).await;
        } else {
            let ticks = delay_ms.div_ceil(1000).max(1);
            self.pending = Some(PendingChargeState {
                state: new_state,
                ticks_remaining: ticks,
            });
        }
    }

    /// Advance any pending debounced charge-state notification by one tick.
    /// Call once per tick from the tick engine.
    pub async fn tick(&mut self, driver: &mut dyn VehicleDriver, metrics: &dyn MetricStore) {
        let fire = if let Some(pending) = self.pending.as_mut() {
            pending.ticks_remaining = pending.ticks_remaining.saturating_sub(1);
            pending.ticks_remaining == 0
        } else {
            false
        };
        if fire {
            if let Some(pending) = self.pending.take() {
                self.fire_charge_state(driver, metrics, pending.state).await;
            }
        }
    }

    /// Observe a 12V-monitor transition and fan it out as a semantic event,
    /// calling the driver's corresponding hook.
    pub async fn observe_12v_event(&self, driver: &mut dyn VehicleDriver, event: TwelveVEvent) {
        let vehicle_event = match event {
            TwelveVEvent::Critical => VehicleEvent::Notified12vCritical,
            TwelveVEvent::Recovered => VehicleEvent::Notified12vRecovered,
        };
        self.publish(vehicle_event).await;
        match event {
            TwelveVEvent::Critical => {
                self.notify_alert("battery.12v.critical", "12V battery critically low")
                    .await;
                driver.on_12v_critical(self.event_bus.as_ref());
            }
            TwelveVEvent::Recovered => {
                self.notify_info("battery.12v.recovered", "12V battery recovered")
                    .await;
                driver.on_12v_recovered(self.event_bus.as_ref());
            }
        }
    }
}

fn reset_charge_durations(metrics: &dyn MetricStore) {
    metrics.set("v.c.duration.full", MetricValue::Int(0));
    metrics.set("v.c.duration.range", MetricValue::Int(0));
    metrics.set("v.c.duration.soc", MetricValue::Int(0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testing::FixtureDriver;
    use crate::events::InMemoryEventBus;
    use crate::metrics::InMemoryMetricStore;
    use crate::notify::NoopNotificationService;

    fn reactor() -> Reactor {
        Reactor::new(
            Arc::new(InMemoryEventBus::new()),
            Arc::new(NoopNotificationService),
            Arc::new(Config::default()),
        )
    }

    #[tokio::test]
    async fn immediate_charge_state_change_fires_right_away() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut rx = bus.subscribe();
        let mut reactor = Reactor::new(
            bus,
            Arc::new(NoopNotificationService),
            Arc::new(Config::default()),
        );
        let mut driver = FixtureDriver::new();
        let metrics = InMemoryMetricStore::new();

        reactor
            .observe_charge_state(&mut driver, &metrics, ChargeState::Charging)
            .await;
        assert_eq!(
            rx.recv().await.unwrap(),
            VehicleEvent::ChargeStateChanged {
                state: "charging".into()
            }
        );
        assert_eq!(rx.recv().await.unwrap(), VehicleEvent::ChargeStarted);
    }

    #[tokio::test]
    async fn duplicate_state_does_not_refire() {
        let mut reactor = reactor();
        let mut driver = FixtureDriver::new();
        let metrics = InMemoryMetricStore::new();

        reactor
            .observe_charge_state(&mut driver, &metrics, ChargeState::Charging)
            .await;
        reactor
            .observe_charge_state(&mut driver, &metrics, ChargeState::Charging)
            .await;
        assert_eq!(reactor.last_charge_state, Some(ChargeState::Charging));
    }

    #[tokio::test]
    async fn done_state_resets_duration_metrics() {
        let mut reactor = reactor();
        let mut driver = FixtureDriver::new();
        let metrics = InMemoryMetricStore::new();
        metrics.set("v.c.duration.full", MetricValue::Int(42));

        reactor
            .observe_charge_state(&mut driver, &metrics, ChargeState::Done)
            .await;
        assert_eq!(
            metrics.get("v.c.duration.full"),
            Some(MetricValue::Int(0))
        );
    }

    #[tokio::test]
    async fn twelve_v_critical_calls_driver_hook_and_publishes() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut rx = bus.subscribe();
        let reactor = Reactor::new(
            bus,
            Arc::new(NoopNotificationService),
            Arc::new(Config::default()),
        );
        let mut driver = FixtureDriver::new();

        reactor
            .observe_12v_event(&mut driver, TwelveVEvent::Critical)
            .await;
        assert_eq!(rx.recv().await.unwrap(), VehicleEvent::Notified12vCritical);
    }

    #[tokio::test]
    async fn vehicle_on_transition_fires_event_and_hook() {
        let bus = Arc::new(InMemoryEventBus::new());
        let mut rx = bus.subscribe();
        let mut reactor = Reactor::new(
            bus,
            Arc::new(NoopNotificationService),
            Arc::new(Config::default()),
        );
        let mut driver = FixtureDriver::new();
        let metrics = InMemoryMetricStore::new();

        let seed = reactor
            .observe_metric_change(
                &mut driver,
                &metrics,
                &MetricChange {
                    name: "v.env.on".into(),
                    value: MetricValue::Bool(true),
                },
            )
            .await;
        assert!(seed.is_none());
        assert_eq!(rx.recv().await.unwrap(), VehicleEvent::VehicleOn);

        // No refire on a repeated identical value.
        reactor
            .observe_metric_change(
                &mut driver,
                &metrics,
                &MetricChange {
                    name: "v.env.on".into(),
                    value: MetricValue::Bool(true),
                },
            )
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn charging12v_start_requests_ticker_seed() {
        let mut reactor = reactor();
        let mut driver = FixtureDriver::new();
        let metrics = InMemoryMetricStore::new();

        let seed = reactor
            .observe_metric_change(
                &mut driver,
                &metrics,
                &MetricChange {
                    name: "v.env.charging12v".into(),
                    value: MetricValue::Bool(true),
                },
            )
            .await;
        assert_eq!(seed, Some(TwelveVSeedRequest { min_ticker: 30 }));
    }

    #[tokio::test]
    async fn hood_alert_only_fires_while_valet_active() {
        let mut reactor = reactor();
        let mut driver = FixtureDriver::new();
        let metrics = InMemoryMetricStore::new();

        // Not in valet mode: hood opening is silently ignored.
        reactor
            .observe_metric_change(
                &mut driver,
                &metrics,
                &MetricChange {
                    name: "v.d.hood".into(),
                    value: MetricValue::Bool(true),
                },
            )
            .await;

        reactor
            .observe_metric_change(
                &mut driver,
                &metrics,
                &MetricChange {
                    name: "v.env.valet".into(),
                    value: MetricValue::Bool(true),
                },
            )
            .await;
        reactor
            .observe_metric_change(
                &mut driver,
                &metrics,
                &MetricChange {
                    name: "v.d.hood".into(),
                    value: MetricValue::Bool(false),
                },
            )
            .await;
        reactor
            .observe_metric_change(
                &mut driver,
                &metrics,
                &MetricChange {
                    name: "v.d.hood".into(),
                    value: MetricValue::Bool(true),
                },
            )
            .await;
        assert!(reactor.valet_active);
    }
}
