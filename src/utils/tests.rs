use super::error::{BrokerError, Error, TransportError};
use super::logging;

#[test]
fn logging_init_accepts_levels() {
    // Should not panic
    logging::init("info");
    logging::init("debug");
    logging::init("warn");
}

#[test]
fn unknown_levels_fall_back_to_info() {
    assert_eq!(logging::normalize_level("WARNING"), "warn");
    assert_eq!(logging::normalize_level("Trace"), "trace");
    assert_eq!(logging::normalize_level("verbose"), "info");
}

#[test]
fn errors_render_their_family() {
    let err = Error::from(BrokerError::PoolClosed);
    assert_eq!(err.to_string(), "broker error: connection pool is closed");

    let err = Error::from(TransportError::Write("socket gone".into()));
    assert_eq!(err.to_string(), "transport error: write failed: socket gone");

    let err = Error::from(TransportError::Read("reset by peer".into()));
    assert_eq!(err.to_string(), "transport error: read failed: reset by peer");

    let codec = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    assert!(Error::from(codec).to_string().starts_with("codec error:"));
}
