//! Pure connection building blocks for the MQTT session
//!
//! Identity and topic derivation plus session option assembly live here,
//! free of I/O, so they can be tested without a broker.

use crate::auth::DeviceCredential;
use crate::config::{BridgeConfig, BrokerSection};
use rumqttc::{ConnectReturnCode, MqttOptions, TlsConfiguration, Transport};
use std::time::Duration;
use thiserror::Error;

/// Transport-layer errors. Always recoverable via backoff, never fatal.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Client request failed: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("Connection lost: {0}")]
    Connection(#[from] rumqttc::ConnectionError),
    #[error("Broker rejected connection: {0:?}")]
    Rejected(ConnectReturnCode),
    #[error("Cannot read CA certificate {path}: {source}")]
    CaCertificate {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Link error: {0}")]
    Link(String),
}

/// Immutable identity registering this device with the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub project_id: String,
    pub region: String,
    pub registry_id: String,
    pub device_id: String,
}

impl DeviceIdentity {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            project_id: config.device.project_id.clone(),
            region: config.device.region.clone(),
            registry_id: config.device.registry_id.clone(),
            device_id: config.device.device_id.clone(),
        }
    }

    /// Client identifier in the registry path form the broker requires
    pub fn client_id(&self) -> String {
        format!(
            "projects/{}/locations/{}/registries/{}/devices/{}",
            self.project_id, self.region, self.registry_id, self.device_id
        )
    }
}

/// The three topics a device session uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTopics {
    /// Outbound readings, published at QoS 1
    pub telemetry: String,
    /// Configuration updates pushed by the cloud
    pub config: String,
    /// Command wildcard covering all command subfolders
    pub commands: String,
}

impl DeviceTopics {
    pub fn for_device(device_id: &str) -> Self {
        Self {
            telemetry: format!("/devices/{device_id}/events"),
            config: format!("/devices/{device_id}/config"),
            commands: format!("/devices/{device_id}/commands/#"),
        }
    }
}

/// Assemble session options for one connection attempt.
///
/// The username is ignored by the broker; the signed token rides in the
/// password field. Each attempt gets the credential current at call time,
/// which is how a refreshed token reaches the wire.
pub fn configure_session_options(
    identity: &DeviceIdentity,
    broker: &BrokerSection,
    ca: Vec<u8>,
    credential: &DeviceCredential,
) -> MqttOptions {
    let mut options = MqttOptions::new(identity.client_id(), broker.host.clone(), broker.port);
    options.set_keep_alive(Duration::from_secs(broker.keep_alive_seconds));
    options.set_credentials("unused", credential.token.as_str());
    options.set_transport(Transport::Tls(TlsConfiguration::Simple {
        ca,
        alpn: None,
        client_auth: None,
    }));
    options
}
