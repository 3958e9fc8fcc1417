//! MQTT transport implementation
//!
//! Split into pure and impure halves so the interesting logic stays
//! testable without a broker:
//!
//! - [`connection`] - Pure session configuration, identity and topic layout
//! - [`events`] - Pure routing of broker events into lifecycle-relevant routes
//! - [`session`] - Impure client/event-loop wrapper behind the [`Session`] trait
//!
//! [`Session`]: crate::transport::Session

pub mod connection;
pub mod events;
pub mod session;

pub use connection::{DeviceIdentity, DeviceTopics, TransportError};
pub use events::EventRoute;
pub use session::{MqttConnector, MqttSession};
