//! Telebridge - device-to-cloud telemetry agent
//!
//! A long-running agent that keeps a constrained device connected to a
//! cloud MQTT broker: it mints short-lived JWT credentials, publishes
//! sensor readings on a fixed cadence, reacts to inbound commands, and
//! survives network instability and token expiry without operator
//! intervention.
//!
//! # Overview
//!
//! The crate is built around a connection-lifecycle state machine:
//! - JWT credential minting with proactive reconnect on expiry
//! - Exponential backoff with jitter that resets rather than gives up
//! - A TLS MQTT session layer split into pure and impure halves
//! - A single-task control loop interleaving pump, recovery and publish
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use telebridge::auth::CredentialMinter;
//! use telebridge::bridge::{LifecycleController, ShellCommandDispatcher, SimulatedSensor};
//! use telebridge::config::BridgeConfig;
//! use telebridge::transport::mqtt::MqttConnector;
//!
//! # async fn run() -> Result<(), telebridge::error::BridgeError> {
//! let config = BridgeConfig::load_from_file(std::path::Path::new("telebridge.toml"))?;
//! let minter = CredentialMinter::from_config(&config)?;
//! let connector = MqttConnector::from_config(&config);
//!
//! let mut controller = LifecycleController::new(
//!     &config,
//!     connector,
//!     minter,
//!     Box::new(SimulatedSensor),
//!     Box::new(ShellCommandDispatcher),
//! );
//! controller.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod backoff;
pub mod bridge;
pub mod config;
pub mod error;
pub mod observability;
pub mod testing;
pub mod transport;

pub use auth::{CredentialMinter, DeviceCredential};
pub use backoff::ExponentialBackoff;
pub use bridge::{LifecycleController, LinkState, ShellCommandDispatcher, SimulatedSensor};
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult};
pub use transport::mqtt::{DeviceIdentity, DeviceTopics, MqttConnector};
