use std::path::PathBuf;

use sensor_uplink::{PipelineConfig, UplinkError};

fn shipped_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/uplink.toml")
}

#[test]
fn shipped_config_matches_defaults() {
    let config = PipelineConfig::load(shipped_config()).unwrap();
    assert_eq!(config, PipelineConfig::default());
}

#[test]
fn missing_file_is_an_io_error() {
    let err = PipelineConfig::load("does/not/exist.toml").unwrap_err();
    assert!(matches!(err, UplinkError::Io(_)));
}

#[test]
fn overrides_keep_unlisted_defaults() {
    let config = PipelineConfig::from_toml_str(
        r#"
        enable_timestamp = true
        transmitter_core = 0

        [transport]
        address = "10.0.0.2:1010"
        "#,
    )
    .unwrap();
    assert!(config.enable_timestamp);
    assert_eq!(config.transmitter_core, Some(0));
    assert_eq!(config.transport.address, "10.0.0.2:1010");
    assert_eq!(config.transport.send_timeout_ms, 4000);
    assert_eq!(config.queue_capacity, 5);
    assert_eq!(config.wire_format().record_size(), 20);
}

#[test]
fn zero_capacity_is_rejected() {
    let err = PipelineConfig::from_toml_str("queue_capacity = 0").unwrap_err();
    assert!(matches!(err, UplinkError::Config(_)));
}

#[test]
fn unparsable_address_fails_before_start() {
    let config = PipelineConfig::from_toml_str(
        r#"
        [transport]
        address = "not-an-address"
        "#,
    )
    .unwrap();
    let err = sensor_uplink::TcpTransport::from_config(&config.transport).unwrap_err();
    assert!(matches!(err, UplinkError::Config(_)));
}
