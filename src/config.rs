//! Configuration management for enphase-venus
//!
//! This module handles loading and validation of the bridge configuration
//! from YAML files. The configuration is read once at startup and handed to
//! the components as an immutable value.

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod defaults;

/// Locations searched when no explicit config path is given
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "enphase_config.yaml",
    "/data/enphase_config.yaml",
    "/etc/enphase-venus/config.yaml",
];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Envoy API authentication
    pub auth: AuthConfig,

    /// Envoy network location and TLS trust
    pub network: NetworkConfig,

    /// Device instance published on D-Bus
    pub device_instance: u32,

    /// Require D-Bus to be available; fail fast on startup if unavailable
    pub require_dbus: bool,

    /// Well-known D-Bus service name
    pub service_name: String,

    /// Static inverter identity and limits
    pub inverter: InverterConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,

    /// Per-request timeout for the Envoy API in milliseconds
    pub request_timeout_ms: u64,
}

/// Envoy API credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Bearer token issued by Enlighten for the local Envoy API
    pub token: String,
}

/// How the TLS certificate of the Envoy is trusted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TlsPolicy {
    /// Skip certificate verification entirely. The Envoy ships a self-signed
    /// certificate, so this is the out-of-the-box behaviour, but it is insecure.
    AcceptInvalid,
    /// Verify against the bundled public root store
    SystemRoots,
    /// Verify against a single PEM encoded CA certificate
    CustomCa { ca_file: String },
}

/// Envoy network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// IP address or host name of the Envoy gateway
    pub ip_address: String,

    /// Certificate trust policy
    pub tls: TlsPolicy,
}

/// Static inverter description published on D-Bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InverterConfig {
    /// Product name shown in the Venus OS UI
    pub product_name: String,

    /// Victron product id
    pub product_id: u32,

    /// Initial value for /Ac/MaxPower in watts
    pub max_power_w: u32,

    /// Initial value for /Position (0=AC input 1, 1=AC output, 2=AC input 2)
    pub position: u8,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional override for the console layer
    pub console_level: Option<String>,

    /// Optional override for the file layer
    pub file_level: Option<String>,

    /// Path to log file (or directory)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from `path`, or from the first default location
    /// that exists. Missing configuration is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let resolved: PathBuf = match path {
            Some(p) => p.to_path_buf(),
            None => DEFAULT_CONFIG_PATHS
                .iter()
                .map(PathBuf::from)
                .find(|p| p.exists())
                .ok_or_else(|| {
                    BridgeError::config(format!(
                        "No configuration file found (searched {})",
                        DEFAULT_CONFIG_PATHS.join(", ")
                    ))
                })?,
        };

        if !resolved.exists() {
            return Err(BridgeError::config(format!(
                "Configuration file '{}' not found",
                resolved.display()
            )));
        }
        Self::from_file(&resolved)
    }

    /// Load and validate in one step
    pub fn load_validated(path: Option<&Path>) -> Result<Self> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.auth.token.trim().is_empty() {
            return Err(BridgeError::validation(
                "auth.token",
                "Envoy token is required",
            ));
        }

        if self.network.ip_address.trim().is_empty() {
            return Err(BridgeError::validation(
                "network.ip_address",
                "Envoy IP address is required",
            ));
        }

        if let TlsPolicy::CustomCa { ca_file } = &self.network.tls
            && ca_file.trim().is_empty()
        {
            return Err(BridgeError::validation(
                "network.tls.ca_file",
                "custom_ca requires a CA file",
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(BridgeError::validation(
                "poll_interval_ms",
                "Must be greater than 0",
            ));
        }

        if self.request_timeout_ms == 0 {
            return Err(BridgeError::validation(
                "request_timeout_ms",
                "Must be greater than 0",
            ));
        }

        if self.service_name.trim().is_empty() {
            return Err(BridgeError::validation(
                "service_name",
                "D-Bus service name cannot be empty",
            ));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
