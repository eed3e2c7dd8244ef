//! # vehicle-core
//!
//! The vehicle abstraction core of an on-board vehicle monitoring system: a
//! driver registry/factory, a CAN reception pipeline, an OBD-II/ISO-TP
//! diagnostic poller, a multi-rate tick engine with derived-state tracking,
//! and a metric-change reactor that turns state transitions into semantic
//! events and notifications.
//!
//! ## Architecture
//!
//! - `can`: the bounded CAN frame queue and the `CanBus` collaborator trait
//! - `obd`: the OBD-II/ISO-TP poller (poll-list scheduling, frame
//!   encode/decode, multi-frame reassembly)
//! - `driver`: the `VehicleDriver` contract, the registry/factory, the tick
//!   engine, the metric-change reactor, the command surface and the stat
//!   formatter, tied together by `driver::runtime`
//! - `metrics`: the generic metric store interface and an in-process
//!   implementation
//! - `events`: semantic vehicle events and the event bus interface
//! - `notify`: the notification transport interface
//! - `config`: YAML-backed configuration for every layer above
//! - `logging`: structured logging built on `tracing`
//! - `web`: the ambient HTTP/SSE surface (feature `web`)
//! - `error`: the crate-wide error type

pub mod can;
pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod obd;

#[cfg(feature = "web")]
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use driver::VehicleDriver;
pub use error::{Result, VehicleCoreError};
