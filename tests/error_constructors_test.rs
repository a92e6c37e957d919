use enphase_venus::error::BridgeError;

#[test]
fn error_constructors_group_1() {
    assert!(matches!(BridgeError::config("x"), BridgeError::Config { .. }));
    assert!(matches!(BridgeError::dbus("x"), BridgeError::DBus { .. }));
    assert!(matches!(BridgeError::io("x"), BridgeError::Io { .. }));
    assert!(matches!(
        BridgeError::validation("f", "m"),
        BridgeError::Validation { .. }
    ));
}

#[test]
fn error_constructors_group_2() {
    assert!(matches!(
        BridgeError::network("x"),
        BridgeError::Network { .. }
    ));
    assert!(matches!(
        BridgeError::timeout("x"),
        BridgeError::Timeout { .. }
    ));
    assert!(matches!(BridgeError::parse("x"), BridgeError::Parse { .. }));
    let rejected = BridgeError::WriteRejected {
        path: "/ProductName".into(),
    };
    assert!(!rejected.is_fetch_error());
    assert!(!rejected.is_parse_error());
}

#[test]
fn io_errors_convert() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let err: BridgeError = io.into();
    assert!(matches!(err, BridgeError::Io { .. }));
}

#[test]
fn display_messages() {
    let e = BridgeError::WriteRejected {
        path: "/Ac/MaxPower".into(),
    };
    assert_eq!(format!("{}", e), "Write rejected for path /Ac/MaxPower");
    let e = BridgeError::timeout("15s elapsed");
    assert!(format!("{}", e).contains("Timeout error"));
}
