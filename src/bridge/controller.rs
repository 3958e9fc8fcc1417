//! Connection lifecycle control
//!
//! The controller owns the link state machine: startup connect, steady
//! publish cadence, backoff recovery and proactive token refresh all run
//! on a single task so publish timing and backoff sleeps stay accurate.
//! Every steady-state failure degrades to "arm backoff and retry";
//! nothing inside the loop terminates the process.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::auth::{CredentialMinter, DeviceCredential};
use crate::backoff::ExponentialBackoff;
use crate::bridge::commands::CommandDispatcher;
use crate::bridge::readings::ReadingSource;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::observability::metrics;
use crate::transport::mqtt::DeviceTopics;
use crate::transport::{Connector, InboundMessage, Session, SessionEvents};

/// Fixed wait between startup connect attempts. Startup deliberately does
/// not use exponential backoff; only the steady-state loop does.
const STARTUP_RETRY_DELAY: Duration = Duration::from_secs(5);

/// How long to pump for the broker acknowledgement after a startup connect
const CONNECT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Wait between the clean disconnect and the reconnect during a token
/// refresh, so the broker side can observe the disconnect first
const REFRESH_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Link connection state, owned exclusively by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Backoff,
}

/// The credential currently authenticating the link, with its mint instant
///
/// Age is tracked on the monotonic clock; the wall-clock claims inside the
/// token are the broker's concern. Replaced wholesale on refresh, never
/// mutated.
#[derive(Debug)]
pub struct ActiveCredential {
    credential: DeviceCredential,
    minted_at: Instant,
}

/// Session event handler keeping link state, backoff and command dispatch
/// in sync with what the wire reports
pub struct LinkMonitor {
    link: LinkState,
    backoff: ExponentialBackoff,
    dispatcher: Box<dyn CommandDispatcher>,
}

impl LinkMonitor {
    fn new(backoff: ExponentialBackoff, dispatcher: Box<dyn CommandDispatcher>) -> Self {
        Self {
            link: LinkState::Disconnected,
            backoff,
            dispatcher,
        }
    }
}

impl SessionEvents for LinkMonitor {
    fn on_connect(&mut self) {
        self.link = LinkState::Connected;
        self.backoff.on_connect_success();
        metrics().connection_established();
        info!("link connected, backoff reset");
    }

    fn on_disconnect(&mut self, reason: &str) {
        self.link = LinkState::Disconnected;
        self.backoff.on_transport_error();
        metrics().connection_lost();
        warn!(reason = %reason, "link lost");
    }

    fn on_message(&mut self, message: InboundMessage) {
        metrics().message_received();
        info!(
            topic = %message.topic,
            qos = message.qos,
            "received inbound message"
        );
        // Dispatcher failures are logged and swallowed, never surfaced to
        // the transport layer.
        match self.dispatcher.dispatch(&message.payload) {
            Ok(()) => metrics().command_dispatched(),
            Err(err) => {
                warn!(error = %err, "command dispatch failed");
                metrics().dispatch_failed();
            }
        }
    }

    fn on_publish_ack(&mut self, packet_id: u16) {
        metrics().publish_acked();
        debug!(packet_id, "publish acknowledged");
    }
}

/// The central control loop driving one device link
pub struct LifecycleController<C: Connector> {
    connector: C,
    minter: CredentialMinter,
    source: Box<dyn ReadingSource>,
    monitor: LinkMonitor,
    session: Option<C::Session>,
    topics: DeviceTopics,
    publish_interval: Duration,
    token_validity: Duration,
}

impl<C: Connector> LifecycleController<C> {
    pub fn new(
        config: &BridgeConfig,
        connector: C,
        minter: CredentialMinter,
        source: Box<dyn ReadingSource>,
        dispatcher: Box<dyn CommandDispatcher>,
    ) -> Self {
        let backoff = ExponentialBackoff::new(config.minimum_backoff(), config.maximum_backoff());
        Self {
            connector,
            minter,
            source,
            monitor: LinkMonitor::new(backoff, dispatcher),
            session: None,
            topics: DeviceTopics::for_device(&config.device.device_id),
            publish_interval: config.publish_interval(),
            token_validity: config.token_validity(),
        }
    }

    pub fn link_state(&self) -> LinkState {
        self.monitor.link
    }

    /// Run the agent until the process is terminated
    pub async fn run(&mut self) -> Result<(), BridgeError> {
        let mut active = self.establish().await?;
        info!(
            publish_interval_secs = self.publish_interval.as_secs(),
            "entering steady-state loop"
        );
        loop {
            self.run_iteration(&mut active).await;
        }
    }

    /// Startup phase: mint a credential and retry connecting on a fixed
    /// delay until the broker acknowledges
    ///
    /// A credential that cannot be minted here is fatal; connect failures
    /// are not. Exponential backoff starts only once the loop is running.
    pub async fn establish(&mut self) -> Result<ActiveCredential, BridgeError> {
        let credential = self.minter.mint()?;
        metrics().credential_minted();
        let active = ActiveCredential {
            minted_at: Instant::now(),
            credential,
        };

        loop {
            metrics().connection_attempt();
            match self.connector.connect(&active.credential).await {
                Ok(session) => {
                    self.monitor.link = LinkState::Connecting;
                    self.session = Some(session);

                    let deadline = Instant::now() + CONNECT_GRACE_PERIOD;
                    while self.monitor.link != LinkState::Connected
                        && Instant::now() < deadline
                        && self.session.is_some()
                    {
                        self.pump_link().await;
                    }

                    if self.monitor.link == LinkState::Connected {
                        info!("initial connection established");
                        return Ok(active);
                    }
                    warn!("connection not acknowledged in time, retrying");
                    self.session = None;
                }
                Err(err) => {
                    warn!(error = %err, "initial connection attempt failed");
                    metrics().connection_failed();
                }
            }
            tokio::time::sleep(STARTUP_RETRY_DELAY).await;
        }
    }

    /// One steady-state iteration: pump, recover, refresh, publish, wait
    ///
    /// Backoff recovery and token refresh are resolved before the publish
    /// step so readings are not sent on a stale or about-to-be-replaced
    /// session.
    pub async fn run_iteration(&mut self, active: &mut ActiveCredential) {
        self.pump_link().await;

        if self.monitor.backoff.should_back_off() {
            self.recover_link(active).await;
        }

        if active.minted_at.elapsed() > self.token_validity {
            self.refresh_credential(active).await;
        }

        if self.monitor.link == LinkState::Connected {
            self.publish_reading().await;
        }

        tokio::time::sleep(self.publish_interval).await;
    }

    /// Drain broker events for one pump window. A pump error drops the
    /// session; the monitor has already armed backoff by then.
    async fn pump_link(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if let Err(err) = session.pump_once(&mut self.monitor).await {
                debug!(error = %err, "pump ended with transport error");
                self.session = None;
            }
        }
    }

    /// Sleep out the next backoff delay, then attempt a reconnect with the
    /// current credential
    async fn recover_link(&mut self, active: &ActiveCredential) {
        self.monitor.link = LinkState::Backoff;
        metrics().backoff_engaged();
        let delay = self.monitor.backoff.next_delay();
        info!(
            delay_ms = delay.as_millis() as u64,
            "backing off before reconnect"
        );
        tokio::time::sleep(delay).await;
        self.reconnect(&active.credential).await;
    }

    /// Replace the credential and rebuild the session around it
    ///
    /// The mint happens first: if it fails the old session stays up and
    /// the refresh is retried next iteration. After a successful mint the
    /// old session is pumped once more, cleanly disconnected, and replaced
    /// after a grace period.
    async fn refresh_credential(&mut self, active: &mut ActiveCredential) {
        info!(
            validity_secs = self.token_validity.as_secs(),
            "credential validity window elapsed, refreshing token"
        );

        let credential = match self.minter.mint() {
            Ok(credential) => credential,
            Err(err) => {
                error!(error = %err, "credential refresh failed, retrying next iteration");
                self.monitor.backoff.on_connect_failure();
                return;
            }
        };
        metrics().credential_minted();
        metrics().token_refreshed();
        active.credential = credential;
        active.minted_at = Instant::now();

        // Settle outstanding traffic before the clean disconnect
        self.pump_link().await;
        if let Some(session) = self.session.take() {
            if let Err(err) = session.disconnect().await {
                debug!(error = %err, "disconnect before refresh failed");
            }
        }
        self.monitor.link = LinkState::Disconnected;
        metrics().connection_lost();

        tokio::time::sleep(REFRESH_GRACE_PERIOD).await;
        self.reconnect(&active.credential).await;
    }

    /// Issue a fresh connect attempt, replacing any previous session
    /// wholesale. Success is observed as a connect acknowledgement on a
    /// later pump.
    async fn reconnect(&mut self, credential: &DeviceCredential) {
        self.session = None;
        metrics().connection_attempt();
        match self.connector.connect(credential).await {
            Ok(session) => {
                self.session = Some(session);
                self.monitor.link = LinkState::Connecting;
                debug!("reconnect issued, awaiting acknowledgement");
            }
            Err(err) => {
                warn!(error = %err, "reconnect attempt failed");
                metrics().connection_failed();
                self.monitor.backoff.on_connect_failure();
            }
        }
    }

    /// Publish one reading to the telemetry topic at QoS 1
    async fn publish_reading(&mut self) {
        let reading = self.source.next_reading();
        let payload = match serde_json::to_vec(&reading) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to encode telemetry reading");
                return;
            }
        };

        let Some(session) = self.session.as_ref() else {
            return;
        };
        match session.publish(&self.topics.telemetry, payload).await {
            Ok(()) => {
                metrics().reading_published();
                debug!(topic = %self.topics.telemetry, "published telemetry reading");
            }
            Err(err) => {
                warn!(error = %err, "telemetry publish failed");
                metrics().publish_failed();
                self.monitor.backoff.on_transport_error();
            }
        }
    }
}
