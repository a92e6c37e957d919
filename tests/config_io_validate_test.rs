use enphase_venus::config::{Config, TlsPolicy};
use std::fs;

fn valid() -> Config {
    let mut cfg = Config::default();
    cfg.auth.token = "eyJhbGciOiJFUzI1NiJ9.token".to_string();
    cfg.network.ip_address = "192.168.1.50".to_string();
    cfg
}

#[test]
fn save_and_load_yaml_roundtrip() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("enphase_config.yaml");

    let mut cfg = valid();
    cfg.device_instance = 42;
    cfg.inverter.max_power_w = 3800;
    cfg.network.tls = TlsPolicy::CustomCa {
        ca_file: "/data/envoy-ca.pem".to_string(),
    };
    cfg.logging.file = tmp_dir.path().join("logs").to_string_lossy().to_string();

    cfg.save_to_file(&path).unwrap();
    let loaded = Config::load(Some(&path)).unwrap();

    assert_eq!(loaded.network.ip_address, "192.168.1.50");
    assert_eq!(loaded.device_instance, 42);
    assert_eq!(loaded.inverter.max_power_w, 3800);
    assert_eq!(loaded.network.tls, cfg.network.tls);
    assert_eq!(loaded.logging.file, cfg.logging.file);
}

#[test]
fn minimal_yaml_fills_defaults() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(
        tmp.path(),
        "auth:\n  token: abc\nnetwork:\n  ip_address: envoy.local\n",
    )
    .unwrap();
    let cfg = Config::load_validated(Some(tmp.path())).unwrap();
    assert_eq!(cfg.poll_interval_ms, 5000);
    assert_eq!(cfg.request_timeout_ms, 15000);
    assert_eq!(cfg.service_name, "com.victronenergy.pvinverter.enphase");
    assert_eq!(cfg.network.tls, TlsPolicy::AcceptInvalid);
    assert_eq!(cfg.inverter.position, 1);
    assert!(cfg.require_dbus);
}

#[test]
fn tls_modes_parse_from_yaml() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(
        tmp.path(),
        "auth:\n  token: abc\nnetwork:\n  ip_address: 10.0.0.2\n  tls:\n    mode: system_roots\n",
    )
    .unwrap();
    let cfg = Config::from_file(tmp.path()).unwrap();
    assert_eq!(cfg.network.tls, TlsPolicy::SystemRoots);
}

#[test]
fn config_validation_errors() {
    assert!(valid().validate().is_ok());

    // Missing token
    let mut cfg = valid();
    cfg.auth.token.clear();
    let msg = cfg.validate().unwrap_err().to_string();
    assert!(msg.contains("auth.token"));

    // Missing address
    cfg = valid();
    cfg.network.ip_address = "  ".to_string();
    assert!(cfg.validate().is_err());

    // Poll interval zero
    cfg = valid();
    cfg.poll_interval_ms = 0;
    assert!(cfg.validate().is_err());

    cfg = valid();
    cfg.request_timeout_ms = 0;
    assert!(cfg.validate().is_err());

    cfg = valid();
    cfg.network.tls = TlsPolicy::CustomCa {
        ca_file: String::new(),
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn explicit_missing_path_is_config_error() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let err = Config::load(Some(&tmp_dir.path().join("absent.yaml"))).unwrap_err();
    assert!(format!("{}", err).contains("Configuration error"));
}

#[test]
fn from_file_with_invalid_yaml_fails() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(tmp.path(), b"auth: [unclosed").unwrap();
    let err = Config::from_file(tmp.path()).unwrap_err();
    let msg = format!("{}", err);
    assert!(msg.contains("Serialization error"));
}
