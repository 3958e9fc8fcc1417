//! Pure routing of broker events
//!
//! Maps raw event-loop output onto the handful of outcomes the session
//! reacts to. No I/O here; the impure dispatch lives in `session`.

use bytes::Bytes;
use rumqttc::{ConnectReturnCode, Event, Packet, SubscribeReasonCode};

/// Routing decision for one polled event
#[derive(Debug, Clone)]
pub enum EventRoute {
    /// Broker accepted the connection; subscriptions may be issued
    Connected { session_present: bool },
    /// Broker refused the connection (bad credentials, bad client id, ...)
    Rejected(ConnectReturnCode),
    /// Message arrived on a subscribed topic
    Inbound {
        topic: String,
        payload: Bytes,
        qos: u8,
    },
    /// Broker acknowledged a QoS 1 publish
    PublishAcked(u16),
    /// Broker answered a subscribe request
    SubscribeAcked { packet_id: u16, failures: usize },
    /// Keep-alive traffic and outgoing echoes; nothing to do
    Ignore,
}

/// Classify one event from the network pump
pub fn route_incoming(event: Event) -> EventRoute {
    match event {
        Event::Incoming(packet) => match packet {
            Packet::ConnAck(ack) => {
                if ack.code == ConnectReturnCode::Success {
                    EventRoute::Connected {
                        session_present: ack.session_present,
                    }
                } else {
                    EventRoute::Rejected(ack.code)
                }
            }
            Packet::Publish(publish) => EventRoute::Inbound {
                topic: publish.topic,
                payload: publish.payload,
                qos: publish.qos as u8,
            },
            Packet::PubAck(ack) => EventRoute::PublishAcked(ack.pkid),
            Packet::SubAck(ack) => EventRoute::SubscribeAcked {
                packet_id: ack.pkid,
                failures: ack
                    .return_codes
                    .iter()
                    .filter(|code| matches!(code, SubscribeReasonCode::Failure))
                    .count(),
            },
            _ => EventRoute::Ignore,
        },
        Event::Outgoing(_) => EventRoute::Ignore,
    }
}
