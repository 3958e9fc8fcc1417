//! Bridge configuration loaded from TOML
//!
//! Everything the connection lifecycle needs to run: device identity,
//! broker endpoint, TLS trust root, credential signing inputs, backoff
//! bounds, and publish cadence. Values are validated after parsing so a
//! bad file fails at startup, not mid-loop.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Main bridge configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    pub device: DeviceSection,
    pub broker: BrokerSection,
    pub tls: TlsSection,
    pub auth: AuthSection,
    #[serde(default)]
    pub backoff: BackoffSection,
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

/// Device registration identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Cloud project the device registry belongs to
    pub project_id: String,
    /// Region the registry is hosted in
    pub region: String,
    /// Registry identifier
    pub registry_id: String,
    /// Device identifier (must match [a-zA-Z0-9._+~%-]+)
    pub device_id: String,
}

/// Broker endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerSection {
    /// Broker hostname
    pub host: String,
    /// Broker TLS port (default: 8883)
    #[serde(default = "default_broker_port")]
    pub port: u16,
    /// MQTT keep-alive interval in seconds (default: 60)
    #[serde(default = "default_keep_alive")]
    pub keep_alive_seconds: u64,
}

fn default_broker_port() -> u16 {
    8883
}

fn default_keep_alive() -> u64 {
    60
}

/// TLS trust settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TlsSection {
    /// Path to the trusted root certificate bundle (PEM)
    pub ca_certificate: String,
}

/// Credential signing settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSection {
    /// Path to the device private key (PEM)
    pub private_key: String,
    /// Signing algorithm: "RS256" or "ES256"
    pub algorithm: String,
    /// How long a minted token stays valid, in minutes (default: 60)
    #[serde(default = "default_token_validity")]
    pub token_validity_minutes: u64,
}

fn default_token_validity() -> u64 {
    60
}

/// Reconnection backoff bounds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackoffSection {
    /// Initial retry delay in seconds (default: 1)
    #[serde(default = "default_minimum_backoff")]
    pub minimum_seconds: u64,
    /// Delay ceiling in seconds; exceeding it resets to the floor (default: 32)
    #[serde(default = "default_maximum_backoff")]
    pub maximum_seconds: u64,
}

fn default_minimum_backoff() -> u64 {
    1
}

fn default_maximum_backoff() -> u64 {
    32
}

impl Default for BackoffSection {
    fn default() -> Self {
        Self {
            minimum_seconds: default_minimum_backoff(),
            maximum_seconds: default_maximum_backoff(),
        }
    }
}

/// Telemetry publishing cadence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySection {
    /// Seconds between readings (default: 15)
    #[serde(default = "default_publish_interval")]
    pub publish_interval_seconds: u64,
}

fn default_publish_interval() -> u64 {
    15
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            publish_interval_seconds: default_publish_interval(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid device ID format: {0}")]
    InvalidDeviceId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BridgeConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: BridgeConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field values beyond what deserialization enforces
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_device_id(&self.device.device_id)?;

        for (label, value) in [
            ("device.project_id", &self.device.project_id),
            ("device.region", &self.device.region),
            ("device.registry_id", &self.device.registry_id),
            ("broker.host", &self.broker.host),
            ("tls.ca_certificate", &self.tls.ca_certificate),
            ("auth.private_key", &self.auth.private_key),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidConfig(format!(
                    "{label} must not be empty"
                )));
            }
        }

        if self.broker.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "broker.port must be non-zero".to_string(),
            ));
        }

        match self.auth.algorithm.to_uppercase().as_str() {
            "RS256" | "ES256" => {}
            other => {
                return Err(ConfigError::InvalidConfig(format!(
                    "auth.algorithm '{other}' is not supported (expected RS256 or ES256)"
                )));
            }
        }

        if self.auth.token_validity_minutes == 0 {
            return Err(ConfigError::InvalidConfig(
                "auth.token_validity_minutes must be at least 1".to_string(),
            ));
        }

        if self.backoff.minimum_seconds == 0 {
            return Err(ConfigError::InvalidConfig(
                "backoff.minimum_seconds must be at least 1".to_string(),
            ));
        }

        if self.backoff.minimum_seconds > self.backoff.maximum_seconds {
            return Err(ConfigError::InvalidConfig(format!(
                "backoff.minimum_seconds ({}) must not exceed backoff.maximum_seconds ({})",
                self.backoff.minimum_seconds, self.backoff.maximum_seconds
            )));
        }

        if self.telemetry.publish_interval_seconds == 0 {
            return Err(ConfigError::InvalidConfig(
                "telemetry.publish_interval_seconds must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Keep-alive interval for the broker session
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.broker.keep_alive_seconds)
    }

    /// Credential validity window
    pub fn token_validity(&self) -> Duration {
        Duration::from_secs(self.auth.token_validity_minutes * 60)
    }

    /// Initial backoff delay
    pub fn minimum_backoff(&self) -> Duration {
        Duration::from_secs(self.backoff.minimum_seconds)
    }

    /// Backoff delay ceiling
    pub fn maximum_backoff(&self) -> Duration {
        Duration::from_secs(self.backoff.maximum_seconds)
    }

    /// Seconds between telemetry publishes
    pub fn publish_interval(&self) -> Duration {
        Duration::from_secs(self.telemetry.publish_interval_seconds)
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[device]
project_id = "test-project"
region = "europe-west1"
registry_id = "test-registry"
device_id = "dev-1"

[broker]
host = "mqtt.example.com"

[tls]
ca_certificate = "tests/fixtures/ca.pem"

[auth]
private_key = "tests/fixtures/rsa_private.pem"
algorithm = "RS256"
token_validity_minutes = 60
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Validate device ID format
fn validate_device_id(device_id: &str) -> Result<(), ConfigError> {
    let valid_chars = device_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+' | '~' | '%'));

    if device_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidDeviceId(format!(
            "Device ID '{device_id}' must match pattern [a-zA-Z0-9._+~%-]+"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parses() {
        let toml_content = r#"
[device]
project_id = "weather-station-prod"
region = "europe-west1"
registry_id = "field-devices"
device_id = "analyzer-42"

[broker]
host = "mqtt.example.com"
port = 443
keep_alive_seconds = 30

[tls]
ca_certificate = "/etc/telebridge/roots.pem"

[auth]
private_key = "/etc/telebridge/device_key.pem"
algorithm = "ES256"
token_validity_minutes = 20

[backoff]
minimum_seconds = 2
maximum_seconds = 64

[telemetry]
publish_interval_seconds = 30
"#;

        let config: BridgeConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.device.project_id, "weather-station-prod");
        assert_eq!(config.broker.port, 443);
        assert_eq!(config.broker.keep_alive_seconds, 30);
        assert_eq!(config.auth.algorithm, "ES256");
        assert_eq!(config.backoff.minimum_seconds, 2);
        assert_eq!(config.backoff.maximum_seconds, 64);
        assert_eq!(config.telemetry.publish_interval_seconds, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let toml_content = r#"
[device]
project_id = "p"
region = "r"
registry_id = "reg"
device_id = "dev-1"

[broker]
host = "mqtt.example.com"

[tls]
ca_certificate = "/certs/roots.pem"

[auth]
private_key = "/certs/key.pem"
algorithm = "RS256"
"#;

        let config: BridgeConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.broker.port, 8883);
        assert_eq!(config.broker.keep_alive_seconds, 60);
        assert_eq!(config.auth.token_validity_minutes, 60);
        assert_eq!(config.backoff.minimum_seconds, 1);
        assert_eq!(config.backoff.maximum_seconds, 32);
        assert_eq!(config.telemetry.publish_interval_seconds, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_device_id() {
        let result = validate_device_id("invalid@device");
        assert!(result.is_err());

        let result = validate_device_id("valid-device_123.test");
        assert!(result.is_ok());

        let result = validate_device_id("");
        assert!(result.is_err());
    }

    #[test]
    fn test_unsupported_algorithm_rejected() {
        let mut config = BridgeConfig::test_config();
        config.auth.algorithm = "HS256".to_string();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig(_)));
        assert!(err.to_string().contains("HS256"));
    }

    #[test]
    fn test_backoff_bounds_checked() {
        let mut config = BridgeConfig::test_config();
        config.backoff.minimum_seconds = 64;
        config.backoff.maximum_seconds = 32;
        assert!(config.validate().is_err());

        config.backoff.minimum_seconds = 0;
        assert!(config.validate().is_err());

        config.backoff.minimum_seconds = 1;
        config.backoff.maximum_seconds = 32;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_publish_interval_rejected() {
        let mut config = BridgeConfig::test_config();
        config.telemetry.publish_interval_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_helpers() {
        let config = BridgeConfig::test_config();
        assert_eq!(config.token_validity(), Duration::from_secs(3600));
        assert_eq!(config.publish_interval(), Duration::from_secs(15));
        assert_eq!(config.minimum_backoff(), Duration::from_secs(1));
        assert_eq!(config.maximum_backoff(), Duration::from_secs(32));
        assert_eq!(config.keep_alive(), Duration::from_secs(60));
    }
}
