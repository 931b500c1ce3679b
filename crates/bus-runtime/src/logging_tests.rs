//! Tests for logging setup.

use super::*;
use serial_test::serial;

/// Verify the configured level is used when RUST_LOG is unset
#[test]
#[serial]
fn test_configured_level() {
    std::env::remove_var("RUST_LOG");
    let config = LoggingConfig {
        level: Some("bus_runtime=debug".to_string()),
        json: false,
    };

    assert_eq!(config.env_filter().to_string(), "bus_runtime=debug");
}

/// Verify an invalid level falls back to the default filter
#[test]
#[serial]
fn test_invalid_level_falls_back() {
    std::env::remove_var("RUST_LOG");
    let config = LoggingConfig {
        level: Some("bus_runtime=loud".to_string()),
        json: true,
    };

    assert_eq!(config.env_filter().to_string(), DEFAULT_FILTER);
}

/// Verify a second global install is reported rather than panicking
#[test]
#[serial]
fn test_second_init_fails() {
    let config = LoggingConfig::default();
    let _ = init(&config);
    assert!(init(&config).is_err());
}
