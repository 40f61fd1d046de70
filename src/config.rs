//! Device configuration parameters
//!
//! Broker credentials, topic roots and timing for the Nosyna node.
//! Defaults are baked in at compile time from `NOSYNA_*` environment
//! variables; a validated copy can be persisted to NVS and overrides them.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Smallest transport buffer that still fits a light discovery descriptor.
pub const MIN_BUFFER_SIZE: usize = 1024;

/// Core device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    // --- Wi-Fi ---
    pub wifi_ssid: String,
    pub wifi_password: String,

    // --- Broker ---
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_password: String,
    /// Session buffer; must hold the largest discovery payload.
    pub mqtt_buffer_size: usize,

    // --- Topics ---
    /// Root of discovery topics (`<prefix>/<kind>/<device>/<entity>/config`).
    pub discovery_prefix: String,
    /// Root of state and command topics (`<root>/<device>/...`).
    pub topic_root: String,
    /// Topic that mirrored log lines are published to.
    pub log_topic: String,

    // --- Device block ---
    pub model: String,
    pub manufacturer: String,

    // --- Timing ---
    /// Main loop period (milliseconds)
    pub tick_interval_ms: u32,
    /// Delay between broker connection attempts (milliseconds)
    pub reconnect_delay_ms: u32,
    /// Minimum spacing of climate sensor samples (milliseconds)
    pub climate_interval_ms: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: option_env!("NOSYNA_WIFI_SSID").unwrap_or("").into(),
            wifi_password: option_env!("NOSYNA_WIFI_PASSWORD").unwrap_or("").into(),

            mqtt_host: option_env!("NOSYNA_MQTT_HOST").unwrap_or("127.0.0.1").into(),
            mqtt_port: option_env!("NOSYNA_MQTT_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(1883),
            mqtt_user: option_env!("NOSYNA_MQTT_USER").unwrap_or("").into(),
            mqtt_password: option_env!("NOSYNA_MQTT_PASSWORD").unwrap_or("").into(),
            mqtt_buffer_size: MIN_BUFFER_SIZE,

            discovery_prefix: "homeassistant".into(),
            topic_root: "nosyna".into(),
            log_topic: "logs/nosyna".into(),

            model: "ESP32_DEV".into(),
            manufacturer: "Nosyna".into(),

            tick_interval_ms: 10,
            reconnect_delay_ms: 500,
            climate_interval_ms: 1000,
        }
    }
}

impl DeviceConfig {
    /// Override fields from `NOSYNA_*` variables resolved through `lookup`.
    ///
    /// Unparseable numeric values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("NOSYNA_WIFI_SSID") {
            self.wifi_ssid = v;
        }
        if let Some(v) = lookup("NOSYNA_WIFI_PASSWORD") {
            self.wifi_password = v;
        }
        if let Some(v) = lookup("NOSYNA_MQTT_HOST") {
            self.mqtt_host = v;
        }
        if let Some(port) = lookup("NOSYNA_MQTT_PORT").and_then(|v| v.parse().ok()) {
            self.mqtt_port = port;
        }
        if let Some(v) = lookup("NOSYNA_MQTT_USER") {
            self.mqtt_user = v;
        }
        if let Some(v) = lookup("NOSYNA_MQTT_PASSWORD") {
            self.mqtt_password = v;
        }
    }

    /// Range-check every field.  Used before persisting and at boot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt_host.is_empty() {
            return Err(ConfigError::ValidationFailed("mqtt_host must not be empty"));
        }
        if self.mqtt_port == 0 {
            return Err(ConfigError::ValidationFailed("mqtt_port must be non-zero"));
        }
        if self.mqtt_buffer_size < MIN_BUFFER_SIZE {
            return Err(ConfigError::ValidationFailed(
                "mqtt_buffer_size must be at least 1024",
            ));
        }
        if self.discovery_prefix.is_empty() || self.topic_root.is_empty() {
            return Err(ConfigError::ValidationFailed("topic roots must not be empty"));
        }
        if self.log_topic.is_empty() {
            return Err(ConfigError::ValidationFailed("log_topic must not be empty"));
        }
        if !(1..=1000).contains(&self.tick_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "tick_interval_ms must be 1–1000",
            ));
        }
        if self.reconnect_delay_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "reconnect_delay_ms must be non-zero",
            ));
        }
        if self.climate_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "climate_interval_ms must be non-zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let c = DeviceConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.reconnect_delay_ms, 500);
        assert!(c.mqtt_buffer_size >= MIN_BUFFER_SIZE);
        assert_eq!(c.discovery_prefix, "homeassistant");
        assert_eq!(c.topic_root, "nosyna");
    }

    #[test]
    fn small_buffer_rejected() {
        let c = DeviceConfig {
            mqtt_buffer_size: 512,
            ..DeviceConfig::default()
        };
        assert!(matches!(c.validate(), Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn zero_port_rejected() {
        let c = DeviceConfig {
            mqtt_port: 0,
            ..DeviceConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut c = DeviceConfig::default();
        c.apply_env(|key| match key {
            "NOSYNA_MQTT_HOST" => Some("broker.lan".into()),
            "NOSYNA_MQTT_PORT" => Some("8883".into()),
            "NOSYNA_MQTT_USER" => Some("node".into()),
            _ => None,
        });
        assert_eq!(c.mqtt_host, "broker.lan");
        assert_eq!(c.mqtt_port, 8883);
        assert_eq!(c.mqtt_user, "node");
    }

    #[test]
    fn bad_port_override_ignored() {
        let mut c = DeviceConfig::default();
        let before = c.mqtt_port;
        c.apply_env(|key| (key == "NOSYNA_MQTT_PORT").then(|| "not-a-port".into()));
        assert_eq!(c.mqtt_port, before);
    }

    #[test]
    fn postcard_roundtrip() {
        let c = DeviceConfig::default();
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: DeviceConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c, c2);
    }
}
