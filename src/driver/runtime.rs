//! The vehicle runtime: ties the active driver, the OBD-II poller, the tick
//! engine, the metric-change reactor and the CAN reception pipeline together
//! into one `tokio::select!` loop.
//!
//! One task owns every mutable piece of state and drives it from a handful
//! of channels, rather than sharing it behind locks across tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::reactor::Reactor;
use super::registry;
use super::tick::{TickEngine, TickInputs};
use super::types::DriverCommand;
use crate::can::{BusId, CanBus, CanFrame};
use crate::config::Config;
use crate::error::{Result, VehicleCoreError};
use crate::events::EventBus;
use crate::logging::get_logger;
use crate::metrics::{MetricStore, MetricValue};
use crate::notify::NotificationService;
use crate::obd::Poller;

/// Everything the tick/frame loop needs, constructed once at process start
/// and handed to [`VehicleRuntime::run`].
pub struct VehicleRuntime {
    config: Arc<Config>,
    metrics: Arc<dyn MetricStore>,
    events: Arc<dyn EventBus>,
    notify: Arc<dyn NotificationService>,
    buses: Vec<Arc<dyn CanBus>>,
    frame_rx: mpsc::Receiver<CanFrame>,
    metric_rx: tokio::sync::broadcast::Receiver<crate::metrics::MetricChange>,
    commands_rx: mpsc::UnboundedReceiver<DriverCommand>,
    poller: Poller,
    tick_engine: TickEngine,
    reactor: Reactor,
    /// Which bus the OBD-II poller sends requests on and expects replies from
    poll_bus: BusId,
}

impl VehicleRuntime {
    /// Construct a runtime over up to three CAN handles, fanning all of them
    /// into one bounded frame queue sized by `config.can.queue_capacity`.
    pub fn new(
        config: Arc<Config>,
        metrics: Arc<dyn MetricStore>,
        events: Arc<dyn EventBus>,
        notify: Arc<dyn NotificationService>,
        buses: Vec<Arc<dyn CanBus>>,
        commands_rx: mpsc::UnboundedReceiver<DriverCommand>,
    ) -> Self {
        let (tx, frame_rx) = mpsc::channel(config.can.queue_capacity);
        for bus in &buses {
            spawn_bus_forwarder(bus.clone(), tx.clone());
        }
        let metric_rx = metrics.subscribe();
        let reactor = Reactor::new(events.clone(), notify.clone(), config.clone());
        Self {
            config,
            metrics,
            events,
            notify,
            buses,
            frame_rx,
            metric_rx,
            commands_rx,
            poller: Poller::new(),
            tick_engine: TickEngine::new(),
            reactor,
            poll_bus: 0,
        }
    }

    async fn send_frame(&self, frame: &CanFrame) -> Result<()> {
        let bus = self
            .buses
            .get(frame.bus as usize)
            .ok_or_else(|| VehicleCoreError::can(format!("no CAN handle for bus {}", frame.bus)))?;
        bus.send_frame(frame).await
    }

    /// Run until every input channel has closed.
    pub async fn run(&mut self) -> Result<()> {
        registry::auto_init(&self.config, self.metrics.as_ref(), self.events.as_ref()).await;

        let mut tick = tokio::time::interval(Duration::from_millis(self.config.tick.period_ms));
        let logger = get_logger("runtime");
        logger.info("vehicle runtime started");

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.on_tick().await {
                        logger.error(&format!("tick processing failed: {e}"));
                    }
                }
                frame = self.frame_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            if let Err(e) = self.on_frame(frame).await {
                                logger.error(&format!("frame processing failed: {e}"));
                            }
                        }
                        None => break,
                    }
                }
                change = self.metric_rx.recv() => {
                    match change {
                        Ok(change) => self.on_metric_change(change).await,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            logger.warn(&format!("metric reactor lagged, skipped {skipped} changes"));
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                cmd = self.commands_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.on_command(cmd).await,
                        None => break,
                    }
                }
            }
        }

        logger.info("vehicle runtime stopped");
        Ok(())
    }

    async fn on_tick(&mut self) -> Result<()> {
        let inputs = self.read_tick_inputs();
        let fired = self.tick_engine.tick(&inputs);

        let mut active = registry::lock_active().await;

        let mut outgoing = Vec::new();
        if let Some(driver) = active.driver_mut() {
            self.poller
                .send_next(driver.poll_list(), &driver.poll_context(), |frame| {
                    outgoing.push(frame);
                    Ok(())
                })?;
        }
        for frame in &outgoing {
            self.send_frame(frame).await?;
        }

        if let Some(driver) = active.driver_mut() {
            driver.ticker_1(self.metrics.as_ref(), fired.master_tick);
            if fired.ticker_10 {
                driver.ticker_10(self.metrics.as_ref(), fired.master_tick);
            }
            if fired.ticker_60 {
                driver.ticker_60(self.metrics.as_ref(), fired.master_tick);
            }
            if fired.ticker_300 {
                driver.ticker_300(self.metrics.as_ref(), fired.master_tick);
            }
            if fired.ticker_600 {
                driver.ticker_600(self.metrics.as_ref(), fired.master_tick);
            }
            if fired.ticker_3600 {
                driver.ticker_3600(self.metrics.as_ref(), fired.master_tick);
            }
        }

        if let Some(driver) = active.driver_mut() {
            self.reactor.tick(driver, self.metrics.as_ref()).await;
        }

        if let Some(event) = fired.twelve_v_event {
            if let Some(driver) = active.driver_mut() {
                self.reactor.observe_12v_event(driver, event).await;
            }
        }

        Ok(())
    }

    async fn on_frame(&mut self, frame: CanFrame) -> Result<()> {
        let mut active = registry::lock_active().await;

        if let Some(driver) = active.driver_mut() {
            driver.incoming_frame(self.metrics.as_ref(), &frame);
        }

        if frame.bus != self.poll_bus {
            return Ok(());
        }

        let mut outgoing = Vec::new();
        let delivery = self.poller.handle_frame(&frame, |f| {
            outgoing.push(f);
            Ok(())
        })?;
        for f in &outgoing {
            self.send_frame(f).await?;
        }

        if let Some((descriptor, payload)) = delivery {
            if let Some(driver) = active.driver_mut() {
                driver.incoming_poll_reply(self.metrics.as_ref(), &descriptor, &payload);
            }
        }

        Ok(())
    }

    async fn on_metric_change(&mut self, change: crate::metrics::MetricChange) {
        let mut active = registry::lock_active().await;
        let Some(driver) = active.driver_mut() else {
            return;
        };
        if let Some(seed) = self
            .reactor
            .observe_metric_change(driver, self.metrics.as_ref(), &change)
            .await
        {
            self.tick_engine.twelve_v_mut().seed_ticker_at_least(seed.min_ticker);
        }
    }

    async fn on_command(&mut self, cmd: DriverCommand) {
        match cmd {
            DriverCommand::SetVehicleType(code) => {
                registry::set_active(&code, self.metrics.as_ref(), self.events.as_ref()).await;
                self.poller.reset_on_state_change();
            }
            DriverCommand::ClearVehicleType => {
                registry::clear_active(self.metrics.as_ref(), self.events.as_ref()).await;
                self.poller.reset_on_state_change();
            }
            DriverCommand::Generic { name, args } => {
                get_logger("runtime")
                    .warn(&format!("unhandled generic command '{name}' args={args:?}"));
            }
        }
    }

    fn read_tick_inputs(&self) -> TickInputs {
        let get_bool = |name: &str| {
            matches!(
                self.metrics.get(name),
                Some(MetricValue::Bool(true)) | Some(MetricValue::Int(1))
            )
        };
        let get_f32 = |name: &str| {
            self.metrics
                .get(name)
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0) as f32
        };
        TickInputs {
            env_on: get_bool("v.env.on"),
            charge_inprogress: get_bool("v.c.inprogress"),
            charging_12v: get_bool("v.env.charging12v"),
            voltage_12v: get_f32("v.bat.12v.voltage"),
            alert_threshold_12v: self.config.vehicle.alert_12v,
            speed: get_f32("v.p.speed"),
            power: get_f32("v.b.power"),
        }
    }
}

/// Forward every frame `bus` receives into the shared, bounded frame queue.
/// Mirrors `can::spawn_receive_loop`, but several buses share one queue
/// rather than each owning its own.
fn spawn_bus_forwarder(bus: Arc<dyn CanBus>, tx: mpsc::Sender<CanFrame>) {
    tokio::spawn(async move {
        let logger = get_logger("can");
        loop {
            match bus.recv_frame().await {
                Ok(frame) => {
                    if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(frame) {
                        logger.warn("receive queue full, dropping frame");
                    } else if tx.is_closed() {
                        break;
                    }
                }
                Err(e) => {
                    logger.error(&format!("CAN bus read failed: {e}"));
                    break;
                }
            }
        }
    });
}
