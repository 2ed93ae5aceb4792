//! Integration tests for configuration loading

use garage_geofence::domain::VehicleId;
use garage_geofence::infra::{AtHomePolicy, Config, TransitionalPolicy};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_load_config_from_file() {
    let temp_file = write_config(
        r#"
[mqtt]
host = "broker.lan"
port = 1884
topic_prefix = "tm"

[door]
base_url = "https://door.example.com"
email = "me@example.com"
password = "secret"

[actuation]
poll_interval_ms = 2000
timeout_ms = 30000
cooldown_minutes = 3
at_home_policy = "on_confirm"
transitional_policy = "wait"

[metrics]
interval_secs = 15
prometheus_port = 9091

[[vehicles]]
id = 1
device_serial = "CG0001"
fence = { latitude = 37.0, longitude = -122.0, radius_km = 0.5 }

[[vehicles]]
id = 2
device_serial = "CG0002"
cooldown_minutes = 10
fence = { latitude = 37.0, longitude = -122.0, radius_km = 1.0, open_radius_km = 0.4 }
"#,
    );

    let config = Config::from_file(temp_file.path()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.mqtt_host(), "broker.lan");
    assert_eq!(config.mqtt_port(), 1884);
    assert_eq!(config.mqtt_topic_prefix(), "tm");
    assert_eq!(config.poll_interval_ms(), 2000);
    assert_eq!(config.actuation_timeout_ms(), 30_000);
    assert_eq!(config.at_home_policy(), AtHomePolicy::OnConfirm);
    assert_eq!(config.transitional_policy(), TransitionalPolicy::Wait);
    assert_eq!(config.prometheus_port(), 9091);
    assert_eq!(config.config_file(), temp_file.path().display().to_string());
    assert!(config.has_door_credentials());

    let vehicles = config.vehicle_states();
    assert_eq!(vehicles.len(), 2);
    assert_eq!(vehicles[0].id(), VehicleId(1));
    assert_eq!(vehicles[0].cooldown(), Duration::from_secs(3 * 60));
    assert_eq!(vehicles[1].device_serial(), "CG0002");
    assert_eq!(vehicles[1].cooldown(), Duration::from_secs(10 * 60));
    assert_eq!(vehicles[1].fence().open_radius_km, 0.4);
    assert!(vehicles.iter().all(|v| v.at_home() && v.fix().is_none()));
}

#[test]
fn test_defaults_applied() {
    let temp_file = write_config(
        r#"
[mqtt]
host = "localhost"

[door]
base_url = "http://localhost:8080"

[[vehicles]]
id = 7
device_serial = "CG7"
fence = { latitude = 51.5, longitude = -0.12, radius_km = 0.2 }
"#,
    );

    let config = Config::from_file(temp_file.path()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.mqtt_port(), 1883);
    assert_eq!(config.mqtt_topic_prefix(), "teslamate");
    assert_eq!(config.poll_interval_ms(), 5000);
    assert_eq!(config.actuation_timeout_ms(), 60_000);
    assert_eq!(config.cooldown_minutes(), 5);
    assert_eq!(config.at_home_policy(), AtHomePolicy::OnIssue);
    assert_eq!(config.transitional_policy(), TransitionalPolicy::Skip);
    assert!(!config.testing());
    assert!(!config.has_door_credentials());
    assert_eq!(config.vehicle_states()[0].fence().open_radius_km, 0.2);
}

#[test]
fn test_env_overrides_supply_credentials() {
    let temp_file = write_config(
        r#"
[mqtt]
host = "localhost"

[door]
base_url = "http://localhost:8080"

[[vehicles]]
id = 1
device_serial = "CG1"
fence = { latitude = 37.0, longitude = -122.0, radius_km = 0.5 }
"#,
    );

    let mut config = Config::from_file(temp_file.path()).unwrap();
    config.apply_overrides(|key| match key {
        "DOOR_EMAIL" => Some("env@example.com".to_string()),
        "DOOR_PASSWORD" => Some("from-env".to_string()),
        "TESTING" => Some("true".to_string()),
        _ => None,
    });

    assert!(config.has_door_credentials());
    assert_eq!(config.door_email(), "env@example.com");
    assert!(config.testing());
}

#[test]
fn test_missing_file_is_an_error() {
    let err = Config::from_file("/nonexistent/garage.toml").unwrap_err();
    assert!(err.to_string().contains("/nonexistent/garage.toml"));
}

#[test]
fn test_malformed_file_is_an_error() {
    let temp_file = write_config("[mqtt\nhost = ");
    assert!(Config::from_file(temp_file.path()).is_err());
}

#[test]
fn test_validation_rejects_inverted_radii() {
    let temp_file = write_config(
        r#"
[mqtt]
host = "localhost"

[door]
base_url = "http://localhost:8080"

[[vehicles]]
id = 1
device_serial = "CG1"
fence = { latitude = 37.0, longitude = -122.0, radius_km = 0.5, open_radius_km = 0.8 }
"#,
    );

    let config = Config::from_file(temp_file.path()).unwrap();
    assert!(config.validate().is_err());
}
