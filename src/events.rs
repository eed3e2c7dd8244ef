//! Semantic vehicle events and the generic event bus collaborator they're
//! published on, out of scope for this crate.

use tokio::sync::broadcast;

/// Semantic events the driver registry and metric-change reactor emit,
/// independent of the concrete vehicle model that triggered them. Payloads
/// are either absent or a short string.
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleEvent {
    /// `vehicle.type.set` — payload is the selected model code
    TypeSet { code: String },
    /// `vehicle.type.cleared`
    TypeCleared,

    VehicleOn,
    VehicleOff,
    VehicleAwake,
    VehicleAsleep,

    ChargeStarted,
    ChargeStopped,
    ChargeDone,
    ChargePrepare,
    ChargeFinish,
    ChargePilotOn,
    ChargePilotOff,
    Charge12vStart,
    Charge12vStop,
    ChargeModeChanged { mode: String },
    ChargeStateChanged { state: String },

    Locked,
    Unlocked,
    ValetOn,
    ValetOff,
    HeadlightsOn,
    HeadlightsOff,
    AlarmOn,
    AlarmOff,

    Notified12vCritical,
    Notified12vRecovered,

    /// Catch-all for model-specific events not covered above
    Custom { name: String, detail: Option<String> },
}

impl VehicleEvent {
    /// The dotted event name, as published on the event bus
    pub fn name(&self) -> String {
        match self {
            VehicleEvent::TypeSet { .. } => "vehicle.type.set".to_string(),
            VehicleEvent::TypeCleared => "vehicle.type.cleared".to_string(),
            VehicleEvent::VehicleOn => "vehicle.on".to_string(),
            VehicleEvent::VehicleOff => "vehicle.off".to_string(),
            VehicleEvent::VehicleAwake => "vehicle.awake".to_string(),
            VehicleEvent::VehicleAsleep => "vehicle.asleep".to_string(),
            VehicleEvent::ChargeStarted => "vehicle.charge.start".to_string(),
            VehicleEvent::ChargeStopped => "vehicle.charge.stop".to_string(),
            VehicleEvent::ChargeDone => "vehicle.charge.done".to_string(),
            VehicleEvent::ChargePrepare => "vehicle.charge.prepare".to_string(),
            VehicleEvent::ChargeFinish => "vehicle.charge.finish".to_string(),
            VehicleEvent::ChargePilotOn => "vehicle.charge.pilot.on".to_string(),
            VehicleEvent::ChargePilotOff => "vehicle.charge.pilot.off".to_string(),
            VehicleEvent::Charge12vStart => "vehicle.charge.12v.start".to_string(),
            VehicleEvent::Charge12vStop => "vehicle.charge.12v.stop".to_string(),
            VehicleEvent::ChargeModeChanged { .. } => "vehicle.charge.mode".to_string(),
            VehicleEvent::ChargeStateChanged { .. } => "vehicle.charge.state".to_string(),
            VehicleEvent::Locked => "vehicle.locked".to_string(),
            VehicleEvent::Unlocked => "vehicle.unlocked".to_string(),
            VehicleEvent::ValetOn => "vehicle.valet.on".to_string(),
            VehicleEvent::ValetOff => "vehicle.valet.off".to_string(),
            VehicleEvent::HeadlightsOn => "vehicle.headlights.on".to_string(),
            VehicleEvent::HeadlightsOff => "vehicle.headlights.off".to_string(),
            VehicleEvent::AlarmOn => "vehicle.alarm.on".to_string(),
            VehicleEvent::AlarmOff => "vehicle.alarm.off".to_string(),
            VehicleEvent::Notified12vCritical => "vehicle.alert.12v.on".to_string(),
            VehicleEvent::Notified12vRecovered => "vehicle.alert.12v.off".to_string(),
            VehicleEvent::Custom { name, .. } => name.clone(),
        }
    }
}

/// Generic event bus: the transport/subscriber side is an external
/// collaborator; this trait is the seam it is wired in behind.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: VehicleEvent);
    fn subscribe(&self) -> broadcast::Receiver<VehicleEvent>;
}

/// Default in-process event bus
pub struct InMemoryEventBus {
    tx: broadcast::Sender<VehicleEvent>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self { tx }
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(&self, event: VehicleEvent) {
        let _ = self.tx.send(event);
    }

    fn subscribe(&self) -> broadcast::Receiver<VehicleEvent> {
        self.tx.subscribe()
    }
}
