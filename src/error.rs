//! Error types and handling for enphase-venus
//!
//! This module defines the error types used throughout the bridge. Fetch and
//! parse failures are recoverable inside a poll cycle; configuration failures
//! are fatal at startup.

use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Main error type for enphase-venus
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// D-Bus communication errors
    #[error("D-Bus error: {message}")]
    DBus { message: String },

    /// Network-related errors (connect, TLS, transport)
    #[error("Network error: {message}")]
    Network { message: String },

    /// Request exceeded its deadline
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Telemetry endpoint answered with a non-success status
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// Telemetry body did not have the expected shape
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// An external write was refused by the change acceptor
    #[error("Write rejected for path {path}")]
    WriteRejected { path: String },
}

impl BridgeError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        BridgeError::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        BridgeError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new D-Bus error
    pub fn dbus<S: Into<String>>(message: S) -> Self {
        BridgeError::DBus {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        BridgeError::Network {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        BridgeError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new parse error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        BridgeError::Parse {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        BridgeError::Io {
            message: message.into(),
        }
    }

    /// Whether this error happened while talking to the telemetry source
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            BridgeError::Network { .. } | BridgeError::Timeout { .. } | BridgeError::Http { .. }
        )
    }

    /// Whether this error comes from a malformed telemetry body
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            BridgeError::Parse { .. } | BridgeError::Serialization { .. }
        )
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for BridgeError {
    fn from(err: serde_yaml::Error) -> Self {
        BridgeError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BridgeError::timeout(err.to_string())
        } else if let Some(status) = err.status() {
            BridgeError::Http {
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            BridgeError::parse(err.to_string())
        } else {
            BridgeError::network(err.to_string())
        }
    }
}

impl From<zbus::Error> for BridgeError {
    fn from(err: zbus::Error) -> Self {
        BridgeError::dbus(err.to_string())
    }
}
