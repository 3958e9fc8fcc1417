//! Token refresh tests
//!
//! A credential past its validity window is replaced proactively: a new
//! token is minted, the old session is cleanly disconnected and the link
//! is rebuilt, all without operator involvement. Runs under a paused tokio
//! clock so the minute-long validity window elapses instantly.

mod test_helpers;

use telebridge::auth::CredentialMinter;
use telebridge::bridge::{LifecycleController, LinkState};
use telebridge::config::BridgeConfig;
use telebridge::testing::mocks::{
    MockConnector, MockConnectorHandle, MockEvent, RecordingDispatcher, StaticReadingSource,
};

fn create_controller(
    config: &BridgeConfig,
) -> (LifecycleController<MockConnector>, MockConnectorHandle) {
    let (connector, connector_handle) = MockConnector::new(&config.device.device_id);
    let minter = CredentialMinter::from_config(config).expect("minter should build from config");

    let controller = LifecycleController::new(
        config,
        connector,
        minter,
        Box::new(StaticReadingSource::default()),
        Box::new(RecordingDispatcher::new()),
    );

    (controller, connector_handle)
}

#[tokio::test(start_paused = true)]
async fn test_expired_credential_is_replaced_and_link_rebuilt() {
    let mut config = test_helpers::test_config();
    config.auth.token_validity_minutes = 1;
    let (mut controller, connector) = create_controller(&config);

    let first = connector.queue_session(vec![MockEvent::Connect]);
    let second = connector.queue_session(vec![MockEvent::Connect]);

    let mut active = controller.establish().await.expect("establish should succeed");

    // Each quiet iteration advances sixteen seconds of virtual time; the
    // 60s validity window elapses during the fifth, which publishes
    // nothing because the rebuilt link is still awaiting its
    // acknowledgement. The sixth iteration completes the handover.
    for _ in 0..6 {
        controller.run_iteration(&mut active).await;
    }

    assert_eq!(
        connector.connect_count(),
        2,
        "one startup connect plus one refresh reconnect"
    );
    assert_eq!(connector.tokens_used().len(), 2);
    assert!(
        first.is_disconnected(),
        "old session should be cleanly disconnected"
    );
    assert_eq!(first.published().len(), 4);
    assert_eq!(second.published().len(), 1);
    assert_eq!(controller.link_state(), LinkState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_mint_keeps_old_session_publishing() {
    let key_dir = tempfile::tempdir().unwrap();
    let key_path = key_dir.path().join("device_key.pem");
    std::fs::copy(test_helpers::fixture_path("rsa_private.pem"), &key_path).unwrap();

    let mut config = test_helpers::test_config();
    config.auth.private_key = key_path.display().to_string();
    config.auth.token_validity_minutes = 1;
    let (mut controller, connector) = create_controller(&config);
    let first = connector.queue_session(vec![MockEvent::Connect]);

    let mut active = controller.establish().await.expect("establish should succeed");
    for _ in 0..4 {
        controller.run_iteration(&mut active).await;
    }

    // The key disappears before the validity window elapses: the refresh
    // mint fails, the old session stays up and the reading still goes out
    std::fs::remove_file(&key_path).unwrap();
    controller.run_iteration(&mut active).await;

    assert_eq!(connector.connect_count(), 1, "no reconnect without a new token");
    assert!(!first.is_disconnected());
    assert_eq!(first.published().len(), 5);
    assert_eq!(controller.link_state(), LinkState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_recovers_once_the_key_returns() {
    let key_dir = tempfile::tempdir().unwrap();
    let key_path = key_dir.path().join("device_key.pem");
    std::fs::copy(test_helpers::fixture_path("rsa_private.pem"), &key_path).unwrap();

    let mut config = test_helpers::test_config();
    config.auth.private_key = key_path.display().to_string();
    config.auth.token_validity_minutes = 1;
    let (mut controller, connector) = create_controller(&config);
    let _first = connector.queue_session(vec![MockEvent::Connect]);

    let mut active = controller.establish().await.expect("establish should succeed");
    for _ in 0..4 {
        controller.run_iteration(&mut active).await;
    }

    // A failed mint arms backoff alongside the pending refresh
    std::fs::remove_file(&key_path).unwrap();
    controller.run_iteration(&mut active).await;

    std::fs::copy(test_helpers::fixture_path("rsa_private.pem"), &key_path).unwrap();
    let interim = connector.queue_session(vec![MockEvent::Connect]);
    let replacement = connector.queue_session(vec![MockEvent::Connect]);

    // Backoff recovery reconnects with the old token first; the refresh
    // that follows in the same iteration mints the new one and swaps the
    // session again
    controller.run_iteration(&mut active).await;
    controller.run_iteration(&mut active).await;

    assert_eq!(connector.connect_count(), 3);
    let tokens = connector.tokens_used();
    assert_eq!(
        tokens[0], tokens[1],
        "backoff recovery retries the existing credential"
    );
    assert!(interim.is_disconnected());
    assert_eq!(replacement.published().len(), 1);
    assert_eq!(controller.link_state(), LinkState::Connected);
}
