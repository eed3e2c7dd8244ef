//! Configuration management for the vehicle core
//!
//! Loads, validates and saves the application configuration from YAML,
//! mirroring the vehicle-core config namespace plus the ambient
//! logging/web sections every crate in this lineage carries.

use crate::error::{Result, VehicleCoreError};
#[cfg(feature = "openapi")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_distance_unit() -> String {
    "km".to_string()
}

fn default_12v_alert() -> f32 {
    1.6
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(JsonSchema))]
#[serde(default)]
pub struct Config {
    /// Active-vehicle and per-vehicle behaviour settings (the `vehicle.*` namespace)
    pub vehicle: VehicleConfig,

    /// CAN bus binding configuration
    pub can: CanConfig,

    /// OBD-II poller timing
    pub poller: PollerConfig,

    /// Tick engine configuration
    pub tick: TickConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Web server binding configuration
    pub web: WebConfig,

    /// Command-surface authentication (`password.pin`)
    pub password: PasswordConfig,
}

/// `vehicle.*` namespace: units, model-selection bridge flags and the 12V alert threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(JsonSchema))]
#[serde(default)]
pub struct VehicleConfig {
    /// Distance unit used by the stat formatter: "km" or "miles"
    pub units_distance: String,

    /// `auto.vehicle.type`: model code to auto-select at startup, if set
    pub auto_type: Option<String>,

    /// `vehicle.stream`: push telemetry updates on every change rather than on tick
    pub stream: bool,

    /// `vehicle.minsoc`: minimum state-of-charge percentage the driver will target
    pub minsoc: u8,

    /// `vehicle.carbits`: bitmask of optional V2 feature flags (see GLOSSARY)
    pub carbits: u32,

    /// `vehicle.canwrite`: allow the driver to transmit on the CAN bus, not just listen
    pub canwrite: bool,

    /// `vehicle.12v.alert`: battery-voltage alert threshold in volts
    #[serde(default = "default_12v_alert")]
    pub alert_12v: f32,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            units_distance: default_distance_unit(),
            auto_type: None,
            stream: false,
            minsoc: 0,
            carbits: 0,
            canwrite: false,
            alert_12v: default_12v_alert(),
        }
    }
}

/// CAN bus binding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(JsonSchema))]
#[serde(default)]
pub struct CanConfig {
    /// Interface name or path passed to the `CanBus` collaborator (e.g. "can0")
    pub interface: String,

    /// Nominal bitrate in bits/second, informational only
    pub bitrate: u32,

    /// Bounded receive-queue capacity (default 20)
    pub queue_capacity: usize,
}

impl Default for CanConfig {
    fn default() -> Self {
        Self {
            interface: "can0".to_string(),
            bitrate: 500_000,
            queue_capacity: 20,
        }
    }
}

/// OBD-II poller timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(JsonSchema))]
#[serde(default)]
pub struct PollerConfig {
    /// Milliseconds between poll-list cursor advances
    pub interval_ms: u64,

    /// ISO-TP separation time between consecutive frames, in milliseconds
    pub stmin_ms: u8,

    /// Milliseconds to wait for a response before marking a PID stale
    pub response_timeout_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            stmin_ms: 25,
            response_timeout_ms: 3000,
        }
    }
}

/// Tick engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(JsonSchema))]
#[serde(default)]
pub struct TickConfig {
    /// Heartbeat period in milliseconds; 1000 (1 Hz) by default
    pub period_ms: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self { period_ms: 1000 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(JsonSchema))]
#[serde(default)]
pub struct LoggingConfig {
    /// Base log level (DEBUG, INFO, WARNING, ERROR, CRITICAL)
    pub level: String,

    /// Path to log file
    pub file: String,

    /// Max log file size in MB
    pub max_file_size_mb: u32,

    /// Number of backup files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,

    /// Console-layer level override; falls back to `level` when unset
    pub console_level: Option<String>,

    /// File-layer level override; falls back to `level` when unset
    pub file_level: Option<String>,

    /// Web/SSE-layer level override; falls back to `level` when unset
    pub web_level: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/vehicle-core.log".to_string(),
            max_file_size_mb: 10,
            backup_count: 5,
            console_output: true,
            json_format: false,
            console_level: None,
            file_level: None,
            web_level: None,
        }
    }
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(JsonSchema))]
#[serde(default)]
pub struct WebConfig {
    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8088,
        }
    }
}

/// `password.*` namespace
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(JsonSchema))]
#[serde(default)]
pub struct PasswordConfig {
    /// PIN required by the command surface for privileged commands, if non-empty
    #[serde(default)]
    pub pin: String,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self { pin: String::new() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vehicle: VehicleConfig::default(),
            can: CanConfig::default(),
            poller: PollerConfig::default(),
            tick: TickConfig::default(),
            logging: LoggingConfig::default(),
            web: WebConfig::default(),
            password: PasswordConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration with validation, trying the conventional locations first
    pub fn load() -> Result<Self> {
        let default_paths = [
            "vehicle_core_config.yaml",
            "/data/vehicle_core_config.yaml",
            "/etc/vehicle-core/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.can.interface.is_empty() {
            return Err(VehicleCoreError::validation(
                "can.interface",
                "Interface name cannot be empty",
            ));
        }

        if self.can.queue_capacity == 0 {
            return Err(VehicleCoreError::validation(
                "can.queue_capacity",
                "Must be greater than 0",
            ));
        }

        if self.poller.interval_ms == 0 {
            return Err(VehicleCoreError::validation(
                "poller.interval_ms",
                "Must be greater than 0",
            ));
        }

        if self.tick.period_ms == 0 {
            return Err(VehicleCoreError::validation(
                "tick.period_ms",
                "Must be greater than 0",
            ));
        }

        if self.vehicle.alert_12v <= 0.0 {
            return Err(VehicleCoreError::validation(
                "vehicle.12v.alert",
                "Must be positive",
            ));
        }

        if !matches!(self.vehicle.units_distance.as_str(), "km" | "miles") {
            return Err(VehicleCoreError::validation(
                "vehicle.units.distance",
                "Must be \"km\" or \"miles\"",
            ));
        }

        Ok(())
    }
}
