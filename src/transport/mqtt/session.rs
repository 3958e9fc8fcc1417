//! Broker session over rumqttc
//!
//! One `MqttSession` wraps one client/event-loop pair and lives exactly as
//! long as one connection attempt: the controller drops it wholesale and
//! asks the connector for a fresh one on reconnect or token refresh. The
//! pump is cooperative; each `pump_once` drains events for a bounded
//! window and hands control back so loop timing stays accurate.

use async_trait::async_trait;
use rumqttc::{AsyncClient, EventLoop, QoS};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::connection::{configure_session_options, DeviceIdentity, DeviceTopics, TransportError};
use super::events::{route_incoming, EventRoute};
use crate::auth::DeviceCredential;
use crate::config::{BridgeConfig, BrokerSection};
use crate::transport::{Connector, InboundMessage, Session, SessionEvents};

/// Time one pump call spends draining broker events before yielding
const PUMP_WINDOW: Duration = Duration::from_secs(1);

/// Request channel capacity between client handle and event loop
const CHANNEL_CAPACITY: usize = 10;

/// A live broker session: one connection attempt, one client/event-loop pair
///
/// The event loop sits behind a `Mutex` only so the session is `Sync` (the
/// `Session` futures must be `Send` and rumqttc's `EventLoop` is not
/// `Sync`); `pump_once` has `&mut self` and reaches it via `get_mut`, so
/// the lock is never contended.
pub struct MqttSession {
    client: AsyncClient,
    event_loop: Mutex<EventLoop>,
    topics: DeviceTopics,
    pump_window: Duration,
}

// The event loop carries no Debug impl; report the fields that do.
impl std::fmt::Debug for MqttSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttSession")
            .field("client", &self.client)
            .field("topics", &self.topics)
            .field("pump_window", &self.pump_window)
            .finish_non_exhaustive()
    }
}

impl MqttSession {
    async fn dispatch(
        &self,
        route: EventRoute,
        events: &mut dyn SessionEvents,
    ) -> Result<(), TransportError> {
        match route {
            EventRoute::Connected { session_present } => {
                debug!(session_present, "broker acknowledged connection");
                // Subscriptions are issued here and only here, so repeated
                // connects never stack duplicates.
                self.client
                    .subscribe(self.topics.config.as_str(), QoS::AtLeastOnce)
                    .await?;
                self.client
                    .subscribe(self.topics.commands.as_str(), QoS::AtLeastOnce)
                    .await?;
                info!(
                    config_topic = %self.topics.config,
                    command_topic = %self.topics.commands,
                    "subscribed to device topics"
                );
                events.on_connect();
            }
            EventRoute::Rejected(code) => {
                let reason = format!("broker rejected connection: {code:?}");
                warn!(code = ?code, "connection rejected by broker");
                events.on_disconnect(&reason);
                return Err(TransportError::Rejected(code));
            }
            EventRoute::Inbound {
                topic,
                payload,
                qos,
            } => match std::str::from_utf8(&payload) {
                Ok(text) => {
                    let payload = text.to_string();
                    events.on_message(InboundMessage {
                        topic,
                        payload,
                        qos,
                    });
                }
                Err(_) => {
                    warn!(topic = %topic, "discarding non-UTF-8 inbound payload");
                }
            },
            EventRoute::PublishAcked(packet_id) => {
                events.on_publish_ack(packet_id);
            }
            EventRoute::SubscribeAcked {
                packet_id,
                failures,
            } => {
                if failures > 0 {
                    warn!(packet_id, failures, "broker rejected subscription");
                } else {
                    debug!(packet_id, "subscription acknowledged");
                }
            }
            EventRoute::Ignore => {}
        }
        Ok(())
    }
}

#[async_trait]
impl Session for MqttSession {
    async fn pump_once(
        &mut self,
        events: &mut dyn SessionEvents,
    ) -> Result<(), TransportError> {
        let deadline = tokio::time::Instant::now() + self.pump_window;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(());
            }

            match tokio::time::timeout(remaining, self.event_loop.get_mut().poll()).await {
                // Window drained without an event: yield back to the loop
                Err(_) => return Ok(()),
                Ok(Ok(event)) => self.dispatch(route_incoming(event), events).await?,
                Ok(Err(err)) => {
                    let reason = err.to_string();
                    events.on_disconnect(&reason);
                    return Err(TransportError::Connection(err));
                }
            }
        }
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.client.disconnect().await?;
        Ok(())
    }
}

/// Builds fresh broker sessions from the current credential
pub struct MqttConnector {
    identity: DeviceIdentity,
    broker: BrokerSection,
    ca_path: PathBuf,
    topics: DeviceTopics,
}

impl MqttConnector {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            identity: DeviceIdentity::from_config(config),
            broker: config.broker.clone(),
            ca_path: PathBuf::from(&config.tls.ca_certificate),
            topics: DeviceTopics::for_device(&config.device.device_id),
        }
    }

    pub fn topics(&self) -> &DeviceTopics {
        &self.topics
    }
}

#[async_trait]
impl Connector for MqttConnector {
    type Session = MqttSession;

    async fn connect(
        &self,
        credential: &DeviceCredential,
    ) -> Result<MqttSession, TransportError> {
        let ca = tokio::fs::read(&self.ca_path).await.map_err(|source| {
            TransportError::CaCertificate {
                path: self.ca_path.display().to_string(),
                source,
            }
        })?;

        let options = configure_session_options(&self.identity, &self.broker, ca, credential);
        info!(
            client_id = %self.identity.client_id(),
            host = %self.broker.host,
            port = self.broker.port,
            token_expires_at = %credential.expires_at,
            "opening broker session"
        );

        // The handshake itself runs lazily inside the first poll; success
        // is observed as a Connected event during pumping.
        let (client, event_loop) = AsyncClient::new(options, CHANNEL_CAPACITY);

        Ok(MqttSession {
            client,
            event_loop: Mutex::new(event_loop),
            topics: self.topics.clone(),
            pump_window: PUMP_WINDOW,
        })
    }
}
