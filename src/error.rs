//! Error types and handling for the vehicle core
//!
//! This module defines the error types used throughout the crate, providing
//! consistent error construction and reporting across the CAN, poller, driver,
//! config and web layers.

use thiserror::Error;

/// Result type alias for vehicle-core operations
pub type Result<T> = std::result::Result<T, VehicleCoreError>;

/// Main error type for the vehicle core
#[derive(Debug, Error)]
pub enum VehicleCoreError {
    /// CAN bus I/O or frame errors
    #[error("CAN error: {message}")]
    Can { message: String },

    /// OBD-II / ISO-TP poller errors
    #[error("Poller error: {message}")]
    Poller { message: String },

    /// Driver registry or driver-instance errors
    #[error("Driver error: {message}")]
    Driver { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// HTTP/Web server errors
    #[error("Web server error: {message}")]
    Web { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl VehicleCoreError {
    /// Create a new CAN error
    pub fn can<S: Into<String>>(message: S) -> Self {
        VehicleCoreError::Can {
            message: message.into(),
        }
    }

    /// Create a new poller error
    pub fn poller<S: Into<String>>(message: S) -> Self {
        VehicleCoreError::Poller {
            message: message.into(),
        }
    }

    /// Create a new driver error
    pub fn driver<S: Into<String>>(message: S) -> Self {
        VehicleCoreError::Driver {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        VehicleCoreError::Config {
            message: message.into(),
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        VehicleCoreError::Web {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        VehicleCoreError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        VehicleCoreError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        VehicleCoreError::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for VehicleCoreError {
    fn from(err: std::io::Error) -> Self {
        VehicleCoreError::generic(err.to_string())
    }
}

impl From<serde_yaml::Error> for VehicleCoreError {
    fn from(err: serde_yaml::Error) -> Self {
        VehicleCoreError::Config {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for VehicleCoreError {
    fn from(err: serde_json::Error) -> Self {
        VehicleCoreError::Generic {
            message: err.to_string(),
        }
    }
}

impl From<chrono::ParseError> for VehicleCoreError {
    fn from(err: chrono::ParseError) -> Self {
        VehicleCoreError::validation("datetime", &err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = VehicleCoreError::config("test config error");
        assert!(matches!(err, VehicleCoreError::Config { .. }));

        let err = VehicleCoreError::can("test can error");
        assert!(matches!(err, VehicleCoreError::Can { .. }));

        let err = VehicleCoreError::validation("field", "test validation error");
        assert!(matches!(err, VehicleCoreError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = VehicleCoreError::config("test error");
        assert_eq!(format!("{err}"), "Configuration error: test error");

        let err = VehicleCoreError::validation("test_field", "invalid value");
        assert_eq!(
            format!("{err}"),
            "Validation error: test_field - invalid value"
        );
    }
}
