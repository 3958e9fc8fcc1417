//! Test helpers and utilities for integration tests

use telebridge::config::{
    AuthSection, BackoffSection, BridgeConfig, BrokerSection, DeviceSection, TelemetrySection,
    TlsSection,
};

/// Absolute path to a key or certificate fixture
#[allow(dead_code)]
pub fn fixture_path(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

/// Create a test configuration for integration tests
#[allow(dead_code)]
pub fn test_config() -> BridgeConfig {
    BridgeConfig {
        device: DeviceSection {
            project_id: "test-project".to_string(),
            region: "europe-west1".to_string(),
            registry_id: "test-registry".to_string(),
            device_id: "dev-1".to_string(),
        },
        broker: BrokerSection {
            host: "mqtt.example.com".to_string(),
            port: 8883,
            keep_alive_seconds: 60,
        },
        tls: TlsSection {
            ca_certificate: fixture_path("ca.pem"),
        },
        auth: AuthSection {
            private_key: fixture_path("rsa_private.pem"),
            algorithm: "RS256".to_string(),
            token_validity_minutes: 60,
        },
        backoff: BackoffSection::default(),
        telemetry: TelemetrySection::default(),
    }
}
