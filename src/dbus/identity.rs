use crate::config::{Config, InverterConfig};
use crate::store::PathSpec;

/// Static metadata of the published pvinverter service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceIdentity {
    pub device_instance: u32,
    pub product_id: u32,
    pub product_name: String,
    /// The Envoy does not expose these; published as 0 like other community drivers
    pub firmware_version: serde_json::Value,
    pub hardware_version: serde_json::Value,
    pub connected: u8,
    pub process_name: String,
    pub process_version: String,
    /// Human readable description of the telemetry source
    pub connection: String,
}

impl ServiceIdentity {
    pub fn from_config(config: &Config, connection: String) -> Self {
        Self {
            device_instance: config.device_instance,
            product_id: config.inverter.product_id,
            product_name: config.inverter.product_name.clone(),
            firmware_version: serde_json::json!(0),
            hardware_version: serde_json::json!(0),
            connected: 1,
            process_name: env!("CARGO_PKG_NAME").to_string(),
            process_version: env!("APP_VERSION").to_string(),
            connection,
        }
    }

    /// Read-only management and identity paths
    pub fn path_specs(&self) -> Vec<PathSpec> {
        vec![
            PathSpec::read_only("/Mgmt/ProcessName", serde_json::json!(self.process_name)),
            PathSpec::read_only(
                "/Mgmt/ProcessVersion",
                serde_json::json!(self.process_version),
            ),
            PathSpec::read_only("/Mgmt/Connection", serde_json::json!(self.connection)),
            PathSpec::read_only("/DeviceInstance", serde_json::json!(self.device_instance)),
            PathSpec::read_only("/ProductId", serde_json::json!(self.product_id)),
            PathSpec::read_only("/ProductName", serde_json::json!(self.product_name)),
            PathSpec::read_only("/FirmwareVersion", self.firmware_version.clone()),
            PathSpec::read_only("/HardwareVersion", self.hardware_version.clone()),
            PathSpec::read_only("/Connected", serde_json::json!(self.connected)),
        ]
    }
}

/// Writable pvinverter paths. Measured values start out invalid.
pub fn pvinverter_paths(inverter: &InverterConfig) -> Vec<PathSpec> {
    vec![
        PathSpec::writable("/Ac/Energy/Forward", serde_json::Value::Null),
        PathSpec::writable("/Ac/Power", serde_json::Value::Null),
        PathSpec::writable("/Ac/MaxPower", serde_json::json!(inverter.max_power_w)),
        PathSpec::writable("/ErrorCode", serde_json::json!(0)),
        PathSpec::writable("/Ac/L1/Power", serde_json::Value::Null),
        PathSpec::writable("/Ac/L1/Current", serde_json::json!(0)),
        PathSpec::writable("/Ac/L1/Voltage", serde_json::json!(0)),
        PathSpec::writable("/Position", serde_json::json!(inverter.position)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pvinverter_table_matches_venus_expectations() {
        let specs = pvinverter_paths(&InverterConfig::default());
        assert_eq!(specs.len(), 8);
        assert!(specs.iter().all(|s| s.writable));

        let initial = |path: &str| {
            specs
                .iter()
                .find(|s| s.path == path)
                .map(|s| s.initial.clone())
                .unwrap()
        };
        assert_eq!(initial("/Ac/Power"), serde_json::Value::Null);
        assert_eq!(initial("/Ac/Energy/Forward"), serde_json::Value::Null);
        assert_eq!(initial("/Ac/L1/Power"), serde_json::Value::Null);
        assert_eq!(initial("/Ac/MaxPower"), serde_json::json!(4350));
        assert_eq!(initial("/ErrorCode"), serde_json::json!(0));
        assert_eq!(initial("/Ac/L1/Current"), serde_json::json!(0));
        assert_eq!(initial("/Ac/L1/Voltage"), serde_json::json!(0));
        assert_eq!(initial("/Position"), serde_json::json!(1));
    }

    #[test]
    fn identity_paths_are_read_only() {
        let mut config = Config::default();
        config.device_instance = 7;
        let identity = ServiceIdentity::from_config(&config, "Envoy at https://x".to_string());
        let specs = identity.path_specs();
        assert!(specs.iter().all(|s| !s.writable));
        let instance = specs.iter().find(|s| s.path == "/DeviceInstance").unwrap();
        assert_eq!(instance.initial, serde_json::json!(7));
        let connected = specs.iter().find(|s| s.path == "/Connected").unwrap();
        assert_eq!(connected.initial, serde_json::json!(1));
    }
}
