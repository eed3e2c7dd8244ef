//! Driver registry & factory
//!
//! A process-wide singleton mapping short vehicle-model codes to
//! constructor functions, guarded by a single `OnceCell<Mutex<...>>`
//! acquired once at process start. The active vehicle itself is a second,
//! separate singleton further down this file: at most one driver instance
//! is ever owned at a time.

use super::VehicleDriver;
use crate::config::Config;
use crate::events::{EventBus, VehicleEvent};
use crate::metrics::{MetricStore, MetricValue};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::MutexGuard;

/// A registered vehicle driver: its short code, display name and constructor
#[derive(Clone, Copy)]
pub struct DriverDescriptor {
    pub code: &'static str,
    pub name: &'static str,
    pub ctor: fn() -> Box<dyn VehicleDriver>,
}

struct Registry {
    drivers: HashMap<&'static str, DriverDescriptor>,
}

static REGISTRY: OnceCell<Mutex<Registry>> = OnceCell::new();

fn registry() -> &'static Mutex<Registry> {
    REGISTRY.get_or_init(|| {
        Mutex::new(Registry {
            drivers: HashMap::new(),
        })
    })
}

/// Register a driver descriptor. Re-registering the same code overwrites the
/// previous entry (useful for tests that swap in a fixture driver).
pub fn register(descriptor: DriverDescriptor) {
    let mut guard = registry().lock().unwrap_or_else(|e| e.into_inner());
    guard.drivers.insert(descriptor.code, descriptor);
}

/// List all registered driver codes and names
pub fn list() -> Vec<(&'static str, &'static str)> {
    let guard = registry().lock().unwrap_or_else(|e| e.into_inner());
    guard
        .drivers
        .values()
        .map(|d| (d.code, d.name))
        .collect()
}

/// Construct a new driver instance for `code`, or `None` if unregistered
pub fn create(code: &str) -> Option<Box<dyn VehicleDriver>> {
    let guard = registry().lock().unwrap_or_else(|e| e.into_inner());
    guard.drivers.get(code).map(|d| (d.ctor)())
}

/// Whether `code` is a known, registered driver
pub fn is_registered(code: &str) -> bool {
    let guard = registry().lock().unwrap_or_else(|e| e.into_inner());
    guard.drivers.contains_key(code)
}

// --- Active-vehicle singleton (set/clear/auto-init) ---
//
// Exactly zero or one driver instance is owned at a time. A `tokio::sync`
// mutex (rather than `std::sync`) so `driver::runtime` can hold the guard
// across the `.await` points in the command surface and the tick/frame loop.

struct ActiveVehicle {
    code: String,
    driver: Box<dyn VehicleDriver>,
}

static ACTIVE: OnceCell<AsyncMutex<Option<ActiveVehicle>>> = OnceCell::new();

fn active_cell() -> &'static AsyncMutex<Option<ActiveVehicle>> {
    ACTIVE.get_or_init(|| AsyncMutex::new(None))
}

/// Locked handle onto the active vehicle, held across the caller's awaits.
pub struct ActiveHandle {
    guard: MutexGuard<'static, Option<ActiveVehicle>>,
}

impl ActiveHandle {
    pub fn driver_mut(&mut self) -> Option<&mut dyn VehicleDriver> {
        self.guard.as_mut().map(|a| a.driver.as_mut() as &mut dyn VehicleDriver)
    }

    pub fn driver(&self) -> Option<&dyn VehicleDriver> {
        self.guard.as_ref().map(|a| a.driver.as_ref() as &dyn VehicleDriver)
    }

    pub fn code(&self) -> Option<&str> {
        self.guard.as_ref().map(|a| a.code.as_str())
    }
}

/// Acquire the active-vehicle lock. Every command-surface call and every tick
/// of `driver::runtime` goes through this single serialization point.
pub async fn lock_active() -> ActiveHandle {
    ActiveHandle {
        guard: active_cell().lock().await,
    }
}

/// `set(code)`: construct and install a new driver instance,
/// dropping whichever one was previously active first. An unknown `code`
/// leaves no active driver, but does not clear the `v.type` metric to
/// absent — it is set to the empty string.
pub async fn set_active(code: &str, metrics: &dyn MetricStore, events: &dyn EventBus) {
    let mut guard = active_cell().lock().await;
    *guard = None;
    match create(code) {
        Some(driver) => {
            *guard = Some(ActiveVehicle {
                code: code.to_string(),
                driver,
            });
            metrics.set("v.type", MetricValue::Str(code.to_string()));
            events.publish(VehicleEvent::TypeSet { code: code.to_string() });
        }
        None => {
            metrics.set("v.type", MetricValue::Str(String::new()));
            events.publish(VehicleEvent::TypeCleared);
        }
    }
}

/// `clear()`: drop the active driver instance, if any.
pub async fn clear_active(metrics: &dyn MetricStore, events: &dyn EventBus) {
    let mut guard = active_cell().lock().await;
    *guard = None;
    metrics.set("v.type", MetricValue::Str(String::new()));
    events.publish(VehicleEvent::TypeCleared);
}

/// `auto_init()`: select `vehicle.auto_type` from config at
/// startup, if one is configured.
pub async fn auto_init(config: &Config, metrics: &dyn MetricStore, events: &dyn EventBus) {
    if let Some(code) = config.vehicle.auto_type.as_deref().filter(|c| !c.is_empty()) {
        set_active(code, metrics, events).await;
    }
}

/// The active vehicle's registry code, if one is selected.
pub async fn active_code() -> Option<String> {
    active_cell().lock().await.as_ref().map(|a| a.code.clone())
}
