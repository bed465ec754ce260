use std::env;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use exporter_app::ExporterConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn defaults_load_without_a_config_file() {
    let _guard = ENV_LOCK.lock().expect("env lock");

    let config = ExporterConfig::load_with_path(None).expect("load config");
    config.validate().expect("validate config");

    assert_eq!(config.listen_port, 9999);
    assert!(!config.simulate);
    assert!(config.devices.is_empty());
    assert_eq!(config.poller.poll_interval, Duration::from_secs(10));
    assert_eq!(config.poller.request_timeout, Duration::from_secs(3));
    assert_eq!(config.cache_ttl, Duration::from_secs(5));
}

#[test]
fn toml_config_validates() {
    let _guard = ENV_LOCK.lock().expect("env lock");

    let config = ExporterConfig::load_with_path(Some(fixture_path("config-valid.toml")))
        .expect("load config");
    config.validate().expect("validate config");

    assert_eq!(config.listen_port, 9100);
    assert!(config.simulate);
    assert_eq!(config.devices.len(), 2);
    assert_eq!(config.devices[0].device_id, "meter-garage");
    assert_eq!(config.poller.poll_interval, Duration::from_millis(15_000));
    assert_eq!(config.cache_ttl, Duration::from_millis(2_000));
}

#[test]
fn json_config_validates() {
    let _guard = ENV_LOCK.lock().expect("env lock");

    let config = ExporterConfig::load_with_path(Some(fixture_path("config-valid.json")))
        .expect("load config");
    config.validate().expect("validate config");

    assert_eq!(config.devices.len(), 1);
    assert_eq!(config.devices[0].address, "192.168.1.41");
}

#[test]
fn duplicate_device_ids_fail_validation() {
    let _guard = ENV_LOCK.lock().expect("env lock");

    let config = ExporterConfig::load_with_path(Some(fixture_path("config-invalid.toml")))
        .expect("load config");
    assert!(config.validate().is_err());
}

#[test]
fn zero_port_fails_validation() {
    let _guard = ENV_LOCK.lock().expect("env lock");

    let mut config = ExporterConfig::load_with_path(None).expect("load config");
    config.listen_port = 0;
    assert!(config.validate().is_err());
}

#[test]
fn env_overrides_take_precedence_over_the_file() {
    let _guard = ENV_LOCK.lock().expect("env lock");
    env::set_var("TUYA_PORT", "9200");
    env::set_var("TUYA_CACHE_TTL_MS", "750");
    env::set_var("TUYA_DEVICES", "meter-a:192.168.1.50:aaaabbbbccccdddd");

    let config = ExporterConfig::load_with_path(Some(fixture_path("config-valid.toml")))
        .expect("load config");

    env::remove_var("TUYA_PORT");
    env::remove_var("TUYA_CACHE_TTL_MS");
    env::remove_var("TUYA_DEVICES");

    config.validate().expect("validate config");
    assert_eq!(config.listen_port, 9200);
    assert_eq!(config.cache_ttl, Duration::from_millis(750));
    assert_eq!(config.devices.len(), 1);
    assert_eq!(config.devices[0].device_id, "meter-a");
    assert_eq!(config.devices[0].local_key, "aaaabbbbccccdddd");
}

fn fixture_path(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path.to_string_lossy().to_string()
}
