//! Mock implementations for testing
//!
//! Provides scripted Session, Connector, CommandDispatcher and
//! ReadingSource implementations so the lifecycle controller can be
//! exercised without a broker, real keys or real sensors.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::auth::DeviceCredential;
use crate::bridge::commands::{CommandDispatcher, DispatchError};
use crate::bridge::readings::{ReadingSource, TelemetryReading};
use crate::transport::mqtt::DeviceTopics;
use crate::transport::{Connector, InboundMessage, Session, SessionEvents, TransportError};

pub type PublishedMessage = (String, Vec<u8>);

/// One scripted broker event, consumed per `pump_once` call
#[derive(Debug, Clone)]
pub enum MockEvent {
    /// Broker acknowledges the connection
    Connect,
    /// An inbound application message
    Message { topic: String, payload: String },
    /// Broker acknowledges an outbound publish
    PublishAck(u16),
    /// The link drops with the given reason
    Error(String),
    /// Nothing happens this pump
    Idle,
}

#[derive(Debug, Default)]
struct MockSessionState {
    script: VecDeque<MockEvent>,
    published: Vec<PublishedMessage>,
    subscriptions: Vec<String>,
    disconnected: bool,
    fail_next_publish: bool,
}

/// Scripted session: each `pump_once` consumes one event from the script
///
/// An exhausted script behaves like a quiet link. Idle pumps sleep for the
/// same window a real pump would spend polling, so paused-clock tests keep
/// advancing.
pub struct MockSession {
    topics: DeviceTopics,
    state: Arc<Mutex<MockSessionState>>,
}

/// Shared view into a [`MockSession`] for assertions after the session has
/// moved into the controller
#[derive(Clone)]
pub struct MockSessionHandle {
    state: Arc<Mutex<MockSessionState>>,
}

impl MockSession {
    pub fn scripted(device_id: &str, script: Vec<MockEvent>) -> (Self, MockSessionHandle) {
        let state = Arc::new(Mutex::new(MockSessionState {
            script: script.into(),
            ..Default::default()
        }));
        let session = Self {
            topics: DeviceTopics::for_device(device_id),
            state: Arc::clone(&state),
        };
        (session, MockSessionHandle { state })
    }
}

impl MockSessionHandle {
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state
            .lock()
            .map(|state| state.published.clone())
            .unwrap_or_default()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|state| state.subscriptions.clone())
            .unwrap_or_default()
    }

    pub fn is_disconnected(&self) -> bool {
        self.state
            .lock()
            .map(|state| state.disconnected)
            .unwrap_or(false)
    }

    /// Append an event to the script mid-test
    pub fn push_event(&self, event: MockEvent) {
        if let Ok(mut state) = self.state.lock() {
            state.script.push_back(event);
        }
    }

    /// Make the next publish call fail with a link error
    pub fn fail_next_publish(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_next_publish = true;
        }
    }
}

#[async_trait]
impl Session for MockSession {
    async fn pump_once(
        &mut self,
        events: &mut dyn SessionEvents,
    ) -> Result<(), TransportError> {
        let event = self
            .state
            .lock()
            .ok()
            .and_then(|mut state| state.script.pop_front());

        match event {
            None | Some(MockEvent::Idle) => {
                // A quiet link spends the full pump window polling
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            }
            Some(MockEvent::Connect) => {
                if let Ok(mut state) = self.state.lock() {
                    state.subscriptions.push(self.topics.config.clone());
                    state.subscriptions.push(self.topics.commands.clone());
                }
                events.on_connect();
                Ok(())
            }
            Some(MockEvent::Message { topic, payload }) => {
                events.on_message(InboundMessage {
                    topic,
                    payload,
                    qos: 1,
                });
                Ok(())
            }
            Some(MockEvent::PublishAck(packet_id)) => {
                events.on_publish_ack(packet_id);
                Ok(())
            }
            Some(MockEvent::Error(reason)) => {
                events.on_disconnect(&reason);
                Err(TransportError::Link(reason))
            }
        }
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if let Ok(mut state) = self.state.lock() {
            if state.fail_next_publish {
                state.fail_next_publish = false;
                return Err(TransportError::Link("scripted publish failure".to_string()));
            }
            state.published.push((topic.to_string(), payload));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if let Ok(mut state) = self.state.lock() {
            state.disconnected = true;
        }
        Ok(())
    }
}

#[derive(Default)]
struct MockConnectorState {
    outcomes: VecDeque<Result<MockSession, String>>,
    tokens_used: Vec<String>,
}

/// Scripted connector handing out queued sessions
pub struct MockConnector {
    device_id: String,
    state: Arc<Mutex<MockConnectorState>>,
}

/// Shared view into a [`MockConnector`] for queueing sessions and
/// inspecting connect attempts
#[derive(Clone)]
pub struct MockConnectorHandle {
    device_id: String,
    state: Arc<Mutex<MockConnectorState>>,
}

impl MockConnector {
    pub fn new(device_id: &str) -> (Self, MockConnectorHandle) {
        let state = Arc::new(Mutex::new(MockConnectorState::default()));
        let connector = Self {
            device_id: device_id.to_string(),
            state: Arc::clone(&state),
        };
        let handle = MockConnectorHandle {
            device_id: device_id.to_string(),
            state,
        };
        (connector, handle)
    }
}

impl MockConnectorHandle {
    /// Queue a session built from the given script; returns its handle
    pub fn queue_session(&self, script: Vec<MockEvent>) -> MockSessionHandle {
        let (session, handle) = MockSession::scripted(&self.device_id, script);
        if let Ok(mut state) = self.state.lock() {
            state.outcomes.push_back(Ok(session));
        }
        handle
    }

    /// Queue a connect attempt that fails with the given reason
    pub fn queue_failure(&self, reason: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.outcomes.push_back(Err(reason.to_string()));
        }
    }

    /// Tokens presented across all connect attempts, in order
    pub fn tokens_used(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|state| state.tokens_used.clone())
            .unwrap_or_default()
    }

    pub fn connect_count(&self) -> usize {
        self.tokens_used().len()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Session = MockSession;

    async fn connect(
        &self,
        credential: &DeviceCredential,
    ) -> Result<MockSession, TransportError> {
        let outcome = match self.state.lock() {
            Ok(mut state) => {
                state.tokens_used.push(credential.token.clone());
                state.outcomes.pop_front()
            }
            Err(_) => None,
        };

        match outcome {
            Some(Ok(session)) => Ok(session),
            Some(Err(reason)) => Err(TransportError::Link(reason)),
            None => Err(TransportError::Link("no scripted session".to_string())),
        }
    }
}

/// Dispatcher recording every payload it is handed
#[derive(Clone, Default)]
pub struct RecordingDispatcher {
    payloads: Arc<Mutex<Vec<String>>>,
    should_fail: bool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub fn dispatched(&self) -> Vec<String> {
        self.payloads
            .lock()
            .map(|payloads| payloads.clone())
            .unwrap_or_default()
    }
}

impl CommandDispatcher for RecordingDispatcher {
    fn dispatch(&self, payload: &str) -> Result<(), DispatchError> {
        if let Ok(mut payloads) = self.payloads.lock() {
            payloads.push(payload.to_string());
        }
        if self.should_fail {
            Err(DispatchError::ExitStatus { code: Some(1) })
        } else {
            Ok(())
        }
    }
}

/// Reading source returning a fixed sample and counting how often it was
/// asked
#[derive(Clone)]
pub struct StaticReadingSource {
    reading: TelemetryReading,
    produced: Arc<Mutex<usize>>,
}

impl StaticReadingSource {
    pub fn new(reading: TelemetryReading) -> Self {
        Self {
            reading,
            produced: Arc::new(Mutex::new(0)),
        }
    }

    pub fn produced_count(&self) -> usize {
        self.produced.lock().map(|count| *count).unwrap_or(0)
    }
}

impl Default for StaticReadingSource {
    fn default() -> Self {
        Self::new(TelemetryReading::new(0.5, 0.5, 0.5, chrono::Utc::now()))
    }
}

impl ReadingSource for StaticReadingSource {
    fn next_reading(&mut self) -> TelemetryReading {
        if let Ok(mut count) = self.produced.lock() {
            *count += 1;
        }
        self.reading.clone()
    }
}

/// SessionEvents recorder for driving sessions directly in tests
#[derive(Debug, Default)]
pub struct RecordingEvents {
    pub connects: usize,
    pub disconnects: Vec<String>,
    pub messages: Vec<InboundMessage>,
    pub acks: Vec<u16>,
}

impl SessionEvents for RecordingEvents {
    fn on_connect(&mut self) {
        self.connects += 1;
    }

    fn on_disconnect(&mut self, reason: &str) {
        self.disconnects.push(reason.to_string());
    }

    fn on_message(&mut self, message: InboundMessage) {
        self.messages.push(message);
    }

    fn on_publish_ack(&mut self, packet_id: u16) {
        self.acks.push(packet_id);
    }
}
