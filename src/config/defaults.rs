use super::*;

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ip_address: String::new(),
            tls: TlsPolicy::default(),
        }
    }
}

impl Default for TlsPolicy {
    fn default() -> Self {
        TlsPolicy::AcceptInvalid
    }
}

impl Default for InverterConfig {
    fn default() -> Self {
        Self {
            product_name: "Enphase".to_string(),
            product_id: 0,
            max_power_w: 4350,
            position: 1,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/var/log/enphase-venus".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth: AuthConfig::default(),
            network: NetworkConfig::default(),
            device_instance: 0,
            require_dbus: true,
            service_name: "com.victronenergy.pvinverter.enphase".to_string(),
            inverter: InverterConfig::default(),
            logging: LoggingConfig::default(),
            poll_interval_ms: 5000,
            request_timeout_ms: 15000,
        }
    }
}
