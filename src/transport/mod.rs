//! Transport layer for broker communication
//!
//! This module defines the session abstraction the lifecycle controller
//! drives, plus the MQTT implementation behind it. The traits exist so the
//! controller can be exercised in tests against scripted sessions instead
//! of a live broker.

use crate::auth::DeviceCredential;

pub mod mqtt;

pub use mqtt::TransportError;

/// An application message received from the broker
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: String,
    pub qos: u8,
}

/// Callbacks raised while a session pumps broker events
///
/// The controller implements this to keep its link state, backoff and
/// command dispatch in sync with what the wire actually reports.
pub trait SessionEvents: Send {
    /// Broker acknowledged the connection; subscriptions are already placed
    fn on_connect(&mut self);

    /// Session observed a transport failure or broker rejection
    fn on_disconnect(&mut self, reason: &str);

    /// An inbound application message arrived
    fn on_message(&mut self, message: InboundMessage);

    /// Broker acknowledged an outbound QoS 1 publish
    fn on_publish_ack(&mut self, packet_id: u16);
}

/// One live connection to the broker
///
/// A session covers a single connection attempt. After any error the
/// controller drops it and asks the [`Connector`] for a replacement; a
/// session is never reused across reconnects.
#[async_trait::async_trait]
pub trait Session: Send {
    /// Drain broker events for a bounded window, raising callbacks as they
    /// arrive. Returns an error when the link drops; the session must not
    /// be pumped again after that.
    async fn pump_once(
        &mut self,
        events: &mut dyn SessionEvents,
    ) -> Result<(), TransportError>;

    /// Publish a payload at QoS 1
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Send a clean disconnect to the broker
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Builds sessions from the current device credential
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    type Session: Session;

    /// Open a new session authenticated with `credential`
    async fn connect(
        &self,
        credential: &DeviceCredential,
    ) -> Result<Self::Session, TransportError>;
}
