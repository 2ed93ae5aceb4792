//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! Door credentials may be supplied (or overridden) with the `DOOR_EMAIL` and
//! `DOOR_PASSWORD` environment variables; `TESTING` toggles test mode.

use crate::domain::geo::{Fence, Point};
use crate::domain::types::VehicleId;
use crate::domain::vehicle::VehicleState;
use anyhow::{bail, Context};
use rustc_hash::FxHashSet;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// When the occupancy assumption flips after an actuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtHomePolicy {
    /// As soon as the command has been accepted by the backend
    #[default]
    OnIssue,
    /// Only once polling has observed the desired terminal state
    OnConfirm,
}

/// What to do when the door reports neither open nor closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionalPolicy {
    /// Report an indeterminate outcome without acting
    #[default]
    Skip,
    /// Keep polling until the door settles, then decide
    Wait,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "garage-geofence".to_string()
}

fn default_topic_prefix() -> String {
    "teslamate".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoorConfig {
    pub base_url: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActuationConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u64,
    #[serde(default)]
    pub at_home_policy: AtHomePolicy,
    #[serde(default)]
    pub transitional_policy: TransitionalPolicy,
    #[serde(default)]
    pub testing: bool,
}

impl Default for ActuationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_ms: default_timeout_ms(),
            cooldown_minutes: default_cooldown_minutes(),
            at_home_policy: AtHomePolicy::default(),
            transitional_policy: TransitionalPolicy::default(),
            testing: false,
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_cooldown_minutes() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
    /// Prometheus metrics HTTP port (0 to disable)
    #[serde(default)]
    pub prometheus_port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval(), prometheus_port: 0 }
    }
}

fn default_metrics_interval() -> u64 {
    60
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FenceConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    /// Defaults to `radius_km`
    #[serde(default)]
    pub open_radius_km: Option<f64>,
}

impl FenceConfig {
    pub fn to_fence(&self) -> Fence {
        let fence = Fence::new(Point::new(self.latitude, self.longitude), self.radius_km);
        match self.open_radius_km {
            Some(open) => fence.with_open_radius(open),
            None => fence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VehicleConfig {
    pub id: i64,
    pub device_serial: String,
    pub fence: FenceConfig,
    /// Overrides `actuation.cooldown_minutes` for this vehicle
    #[serde(default)]
    pub cooldown_minutes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    pub mqtt: MqttConfig,
    pub door: DoorConfig,
    #[serde(default)]
    pub actuation: ActuationConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub vehicles: Vec<VehicleConfig>,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    mqtt_host: String,
    mqtt_port: u16,
    mqtt_client_id: String,
    mqtt_topic_prefix: String,
    mqtt_username: Option<String>,
    mqtt_password: Option<String>,
    mqtt_keep_alive_secs: u64,
    door_base_url: String,
    door_email: String,
    door_password: String,
    door_request_timeout_ms: u64,
    poll_interval_ms: u64,
    actuation_timeout_ms: u64,
    cooldown_minutes: u64,
    at_home_policy: AtHomePolicy,
    transitional_policy: TransitionalPolicy,
    testing: bool,
    metrics_interval_secs: u64,
    prometheus_port: u16,
    vehicles: Vec<VehicleConfig>,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        let actuation = ActuationConfig::default();
        Self {
            mqtt_host: "localhost".to_string(),
            mqtt_port: default_mqtt_port(),
            mqtt_client_id: default_client_id(),
            mqtt_topic_prefix: default_topic_prefix(),
            mqtt_username: None,
            mqtt_password: None,
            mqtt_keep_alive_secs: default_keep_alive_secs(),
            door_base_url: "http://localhost:8080".to_string(),
            door_email: String::new(),
            door_password: String::new(),
            door_request_timeout_ms: default_request_timeout_ms(),
            poll_interval_ms: actuation.poll_interval_ms,
            actuation_timeout_ms: actuation.timeout_ms,
            cooldown_minutes: actuation.cooldown_minutes,
            at_home_policy: actuation.at_home_policy,
            transitional_policy: actuation.transitional_policy,
            testing: actuation.testing,
            metrics_interval_secs: default_metrics_interval(),
            prometheus_port: 0,
            vehicles: Vec::new(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Determine config file path from the CLI value or environment
    pub fn resolve_config_path(cli_path: Option<&str>) -> String {
        if let Some(path) = cli_path {
            return path.to_string();
        }

        // Check CONFIG_FILE environment variable
        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.config_file = path.display().to_string();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let toml_config: TomlConfig = toml::from_str(content)?;

        Ok(Self {
            mqtt_host: toml_config.mqtt.host,
            mqtt_port: toml_config.mqtt.port,
            mqtt_client_id: toml_config.mqtt.client_id,
            mqtt_topic_prefix: toml_config.mqtt.topic_prefix,
            mqtt_username: toml_config.mqtt.username,
            mqtt_password: toml_config.mqtt.password,
            mqtt_keep_alive_secs: toml_config.mqtt.keep_alive_secs,
            door_base_url: toml_config.door.base_url,
            door_email: toml_config.door.email,
            door_password: toml_config.door.password,
            door_request_timeout_ms: toml_config.door.request_timeout_ms,
            poll_interval_ms: toml_config.actuation.poll_interval_ms,
            actuation_timeout_ms: toml_config.actuation.timeout_ms,
            cooldown_minutes: toml_config.actuation.cooldown_minutes,
            at_home_policy: toml_config.actuation.at_home_policy,
            transitional_policy: toml_config.actuation.transitional_policy,
            testing: toml_config.actuation.testing,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            prometheus_port: toml_config.metrics.prometheus_port,
            vehicles: toml_config.vehicles,
            config_file: "inline".to_string(),
        })
    }

    /// Apply `DOOR_EMAIL`, `DOOR_PASSWORD` and `TESTING` from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(email) = lookup("DOOR_EMAIL") {
            self.door_email = email;
        }
        if let Some(password) = lookup("DOOR_PASSWORD") {
            self.door_password = password;
        }
        if let Some(testing) = lookup("TESTING").and_then(|v| parse_bool(&v)) {
            self.testing = testing;
        }
    }

    /// Check invariants the core relies on
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.vehicles.is_empty() {
            bail!("at least one [[vehicles]] entry is required");
        }
        if self.poll_interval_ms == 0 {
            bail!("actuation.poll_interval_ms must be greater than zero");
        }

        let mut seen = FxHashSet::default();
        for vehicle in &self.vehicles {
            if !seen.insert(vehicle.id) {
                bail!("duplicate vehicle id {}", vehicle.id);
            }
            let fence = vehicle.fence.to_fence();
            if !(fence.close_radius_km >= 0.0 && fence.open_radius_km >= 0.0) {
                bail!("vehicle {}: fence radii must be non-negative", vehicle.id);
            }
            if fence.open_radius_km > fence.close_radius_km {
                bail!("vehicle {}: open_radius_km must not exceed radius_km", vehicle.id);
            }
        }
        Ok(())
    }

    pub fn has_door_credentials(&self) -> bool {
        !self.door_email.is_empty() && !self.door_password.is_empty()
    }

    /// Build the per-vehicle state records
    pub fn vehicle_states(&self) -> Vec<VehicleState> {
        self.vehicles
            .iter()
            .map(|v| {
                let minutes = v.cooldown_minutes.unwrap_or(self.cooldown_minutes);
                VehicleState::new(
                    VehicleId(v.id),
                    v.device_serial.clone(),
                    v.fence.to_fence(),
                    Duration::from_secs(minutes.saturating_mul(60)),
                )
            })
            .collect()
    }

    pub fn set_testing(&mut self, testing: bool) {
        self.testing = testing;
    }

    // Getters for all config fields
    pub fn mqtt_host(&self) -> &str {
        &self.mqtt_host
    }

    pub fn mqtt_port(&self) -> u16 {
        self.mqtt_port
    }

    pub fn mqtt_client_id(&self) -> &str {
        &self.mqtt_client_id
    }

    pub fn mqtt_topic_prefix(&self) -> &str {
        &self.mqtt_topic_prefix
    }

    pub fn mqtt_username(&self) -> Option<&str> {
        self.mqtt_username.as_deref()
    }

    pub fn mqtt_password(&self) -> Option<&str> {
        self.mqtt_password.as_deref()
    }

    pub fn mqtt_keep_alive_secs(&self) -> u64 {
        self.mqtt_keep_alive_secs
    }

    pub fn door_base_url(&self) -> &str {
        &self.door_base_url
    }

    pub fn door_email(&self) -> &str {
        &self.door_email
    }

    pub fn door_password(&self) -> &str {
        &self.door_password
    }

    pub fn door_request_timeout_ms(&self) -> u64 {
        self.door_request_timeout_ms
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms
    }

    pub fn actuation_timeout_ms(&self) -> u64 {
        self.actuation_timeout_ms
    }

    pub fn cooldown_minutes(&self) -> u64 {
        self.cooldown_minutes
    }

    pub fn at_home_policy(&self) -> AtHomePolicy {
        self.at_home_policy
    }

    pub fn transitional_policy(&self) -> TransitionalPolicy {
        self.transitional_policy
    }

    pub fn testing(&self) -> bool {
        self.testing
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn prometheus_port(&self) -> u16 {
        self.prometheus_port
    }

    pub fn vehicles(&self) -> &[VehicleConfig] {
        &self.vehicles
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to point at a door backend
    #[cfg(test)]
    pub fn with_door_base_url(mut self, url: &str) -> Self {
        self.door_base_url = url.to_string();
        self
    }

    /// Builder method for tests to set door credentials
    #[cfg(test)]
    pub fn with_door_credentials(mut self, email: &str, password: &str) -> Self {
        self.door_email = email.to_string();
        self.door_password = password.to_string();
        self
    }

    /// Builder method for tests to add a vehicle
    #[cfg(test)]
    pub fn with_vehicle(mut self, vehicle: VehicleConfig) -> Self {
        self.vehicles.push(vehicle);
        self
    }
}

/// Lenient boolean used for TESTING and DEBUG environment flags
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" => Some(true),
        "0" | "false" | "f" | "no" => Some(false),
        _ => None,
    }
}
