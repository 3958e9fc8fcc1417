//! Lifecycle controller loop tests
//!
//! Drives the controller against scripted sessions under a paused tokio
//! clock: startup retry, steady publish cadence, link-loss recovery and
//! publish gating while disconnected. Every timer in the controller runs
//! on virtual time, so multi-minute schedules complete instantly.

mod test_helpers;

use telebridge::auth::CredentialMinter;
use telebridge::bridge::{LifecycleController, LinkState};
use telebridge::config::BridgeConfig;
use telebridge::error::BridgeError;
use telebridge::testing::mocks::{
    MockConnector, MockConnectorHandle, MockEvent, RecordingDispatcher, StaticReadingSource,
};

/// Build a controller wired to mock everything, returning the handles the
/// assertions need
fn create_controller(
    config: &BridgeConfig,
) -> (
    LifecycleController<MockConnector>,
    MockConnectorHandle,
    StaticReadingSource,
    RecordingDispatcher,
) {
    let (connector, connector_handle) = MockConnector::new(&config.device.device_id);
    let source = StaticReadingSource::default();
    let dispatcher = RecordingDispatcher::new();
    let minter = CredentialMinter::from_config(config).expect("minter should build from config");

    let controller = LifecycleController::new(
        config,
        connector,
        minter,
        Box::new(source.clone()),
        Box::new(dispatcher.clone()),
    );

    (controller, connector_handle, source, dispatcher)
}

#[tokio::test(start_paused = true)]
async fn test_startup_retries_on_fixed_delay_until_accepted() {
    let config = test_helpers::test_config();
    let (mut controller, connector, _source, _dispatcher) = create_controller(&config);

    connector.queue_failure("connection refused");
    connector.queue_failure("connection refused");
    let session = connector.queue_session(vec![MockEvent::Connect]);

    controller
        .establish()
        .await
        .expect("establish should succeed once the broker accepts");

    assert_eq!(connector.connect_count(), 3);
    assert_eq!(controller.link_state(), LinkState::Connected);
    assert_eq!(
        session.subscriptions(),
        vec!["/devices/dev-1/config", "/devices/dev-1/commands/#"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_startup_fails_fast_when_private_key_is_missing() {
    let mut config = test_helpers::test_config();
    config.auth.private_key = "/nonexistent/key.pem".to_string();
    let (mut controller, connector, _source, _dispatcher) = create_controller(&config);

    let err = controller.establish().await.unwrap_err();

    assert!(matches!(err, BridgeError::Credential(_)));
    assert_eq!(
        connector.connect_count(),
        0,
        "no connect attempt without a credential"
    );
}

#[tokio::test(start_paused = true)]
async fn test_startup_retries_past_an_unacknowledged_connect() {
    let config = test_helpers::test_config();
    let (mut controller, connector, _source, _dispatcher) = create_controller(&config);

    // First session never delivers the acknowledgement
    let silent = connector.queue_session(vec![]);
    let accepted = connector.queue_session(vec![MockEvent::Connect]);

    controller
        .establish()
        .await
        .expect("establish should move past a silent session");

    assert_eq!(connector.connect_count(), 2);
    assert_eq!(controller.link_state(), LinkState::Connected);
    assert!(silent.published().is_empty());
    assert_eq!(
        accepted.subscriptions(),
        vec!["/devices/dev-1/config", "/devices/dev-1/commands/#"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_steady_state_publishes_once_per_interval() {
    let config = test_helpers::test_config();
    let (mut controller, connector, source, _dispatcher) = create_controller(&config);
    let session = connector.queue_session(vec![MockEvent::Connect]);

    let mut active = controller.establish().await.expect("establish should succeed");
    for _ in 0..3 {
        controller.run_iteration(&mut active).await;
    }

    let published = session.published();
    assert_eq!(published.len(), 3);
    assert_eq!(source.produced_count(), 3);
    for (topic, payload) in &published {
        assert_eq!(topic, "/devices/dev-1/events");
        let value: serde_json::Value = serde_json::from_slice(payload).unwrap();
        assert_eq!(value["temperature"], 0.5);
        assert_eq!(value["pressure"], 0.5);
        assert_eq!(value["humidity"], 0.5);
        assert!(value["timestamp"].is_string());
    }
    assert_eq!(controller.link_state(), LinkState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_link_drop_backs_off_then_reconnects() {
    let config = test_helpers::test_config();
    let (mut controller, connector, _source, _dispatcher) = create_controller(&config);
    let first = connector.queue_session(vec![
        MockEvent::Connect,
        MockEvent::Error("socket reset".to_string()),
    ]);
    let second = connector.queue_session(vec![MockEvent::Connect]);

    let mut active = controller.establish().await.expect("establish should succeed");

    // Pump hits the scripted error: backoff engages, the reconnect is
    // issued after the delay, and nothing is published this round
    controller.run_iteration(&mut active).await;
    assert!(first.published().is_empty());
    assert_ne!(controller.link_state(), LinkState::Connected);

    // The acknowledgement arrives on the replacement session
    controller.run_iteration(&mut active).await;

    assert_eq!(connector.connect_count(), 2);
    assert_eq!(controller.link_state(), LinkState::Connected);
    assert_eq!(second.published().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_reconnect_keeps_backing_off() {
    let config = test_helpers::test_config();
    let (mut controller, connector, _source, _dispatcher) = create_controller(&config);
    let _first = connector.queue_session(vec![
        MockEvent::Connect,
        MockEvent::Error("socket reset".to_string()),
    ]);

    let mut active = controller.establish().await.expect("establish should succeed");

    connector.queue_failure("connection refused");
    let replacement = connector.queue_session(vec![MockEvent::Connect]);

    // Scripted error, then a reconnect attempt that fails outright
    controller.run_iteration(&mut active).await;
    assert_ne!(controller.link_state(), LinkState::Connected);

    // Second backoff round lands the replacement session
    controller.run_iteration(&mut active).await;
    // Acknowledgement and the first publish on the new link
    controller.run_iteration(&mut active).await;

    assert_eq!(connector.connect_count(), 3);
    assert_eq!(controller.link_state(), LinkState::Connected);
    assert_eq!(replacement.published().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_readings_published_while_disconnected() {
    let config = test_helpers::test_config();
    let (mut controller, connector, source, _dispatcher) = create_controller(&config);
    let first = connector.queue_session(vec![
        MockEvent::Connect,
        MockEvent::Error("socket reset".to_string()),
    ]);

    let mut active = controller.establish().await.expect("establish should succeed");

    // No replacement is queued, so every reconnect attempt fails
    controller.run_iteration(&mut active).await;
    controller.run_iteration(&mut active).await;

    assert!(first.published().is_empty());
    assert_eq!(source.produced_count(), 0, "no samples taken while down");
    assert_ne!(controller.link_state(), LinkState::Connected);
    assert_eq!(connector.connect_count(), 3);
}
