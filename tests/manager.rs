//! Integration tests for the pairing manager lifecycle, driven through the
//! scripted mock radio under paused tokio time.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::sleep;

use teddy_link::ble::mock::{
    ConnectOutcome, DiscoveryOutcome, MockRadio, RadioCall, TransferUnitOutcome,
};
use teddy_link::{ManagerEvent, Notification, PairingConfig, PairingManager, SignalStrength};

fn new_manager() -> (Arc<MockRadio>, PairingManager<MockRadio>) {
    let radio = Arc::new(MockRadio::new());
    let manager = PairingManager::new(radio.clone(), PairingConfig::default());
    (radio, manager)
}

/// Lets spawned session tasks run. Time is paused, so the tick is virtual.
async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

fn drain(receiver: &mut broadcast::Receiver<Notification>) -> Vec<ManagerEvent> {
    let mut events = Vec::new();
    while let Ok(notification) = receiver.try_recv() {
        events.push(notification.event);
    }
    events
}

fn count_matching(events: &[ManagerEvent], predicate: impl Fn(&ManagerEvent) -> bool) -> usize {
    events.iter().filter(|e| predicate(e)).count()
}

#[tokio::test(start_paused = true)]
async fn dedup_keeps_latest_signal_level() {
    let (radio, mut manager) = new_manager();
    radio.queue_advertisement("id-a", Some("Teddy-ESP32"), -40);
    radio.queue_advertisement("id-b", Some("Living Room TV"), -80);

    manager.start_scan().await.unwrap();
    settle().await;
    assert!(radio.push_advertisement("id-a", Some("Teddy-ESP32"), -45));
    settle().await;

    let devices = manager.discovered_peripherals();
    assert_eq!(devices.len(), 2);
    // Discovery order is preserved; the repeat observation updated in place.
    assert_eq!(devices[0].id, "id-a");
    assert_eq!(devices[0].rssi, -45);
    assert_eq!(devices[0].signal_strength(), SignalStrength::Strong);
    assert_eq!(devices[1].id, "id-b");
    assert_eq!(devices[1].rssi, -80);
    assert_eq!(devices[1].signal_strength(), SignalStrength::Weak);
}

#[tokio::test(start_paused = true)]
async fn repeat_observation_keeps_first_seen_name() {
    let (radio, mut manager) = new_manager();
    radio.queue_advertisement("id-a", Some("Teddy-ESP32"), -40);

    manager.start_scan().await.unwrap();
    settle().await;
    assert!(radio.push_advertisement("id-a", Some("Teddy-ESP32 (2)"), -55));
    settle().await;

    let devices = manager.discovered_peripherals();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].name, "Teddy-ESP32");
    assert_eq!(devices[0].rssi, -55);
}

#[tokio::test(start_paused = true)]
async fn unnamed_peripherals_are_never_surfaced() {
    let (radio, mut manager) = new_manager();
    radio.queue_advertisement("id-x", None, -40);
    radio.queue_advertisement("id-y", Some(""), -40);
    radio.queue_advertisement("id-z", Some("Teddy-ESP32"), -40);

    let mut notifications = manager.subscribe();
    manager.start_scan().await.unwrap();
    settle().await;

    let devices = manager.discovered_peripherals();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].id, "id-z");

    let events = drain(&mut notifications);
    assert_eq!(
        count_matching(&events, |e| matches!(e, ManagerEvent::DeviceFound { .. })),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn restarting_a_scan_discards_previous_results() {
    let (radio, mut manager) = new_manager();
    radio.queue_advertisement("id-a", Some("Teddy-ESP32"), -40);

    manager.start_scan().await.unwrap();
    settle().await;
    assert_eq!(manager.discovered_peripherals().len(), 1);

    radio.queue_advertisement("id-c", Some("Other Teddy"), -60);
    manager.start_scan().await.unwrap();
    settle().await;

    let devices = manager.discovered_peripherals();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].id, "id-c");
    assert!(manager.is_scanning());

    // The first session was stopped before the second one started.
    let calls = radio.calls();
    let second_start = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, RadioCall::StartScan))
        .nth(1)
        .map(|(i, _)| i)
        .unwrap();
    assert!(
        calls[..second_start]
            .iter()
            .any(|c| matches!(c, RadioCall::StopScan))
    );
}

#[tokio::test(start_paused = true)]
async fn scan_session_auto_stops_at_the_window() {
    let (radio, mut manager) = new_manager();
    radio.queue_advertisement("id-a", Some("Teddy-ESP32"), -40);

    let mut notifications = manager.subscribe();
    manager.start_scan().await.unwrap();
    settle().await;

    sleep(Duration::from_secs(5)).await;
    assert!(manager.is_scanning());

    sleep(Duration::from_secs(6)).await;
    assert!(!manager.is_scanning());
    assert!(radio.calls().iter().any(|c| matches!(c, RadioCall::StopScan)));

    let events = drain(&mut notifications);
    assert!(events.contains(&ManagerEvent::ScanComplete));

    // The session is closed: nothing accepts events any more.
    assert!(!radio.push_advertisement("id-late", Some("Latecomer"), -30));
    assert_eq!(manager.discovered_peripherals().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn scan_error_terminates_the_session_without_retry() {
    let (radio, mut manager) = new_manager();
    radio.queue_advertisement("id-a", Some("Teddy-ESP32"), -40);
    radio.queue_scan_error("radio powered off");

    let mut notifications = manager.subscribe();
    manager.start_scan().await.unwrap();
    settle().await;

    assert!(!manager.is_scanning());
    let events = drain(&mut notifications);
    assert_eq!(
        count_matching(&events, |e| matches!(e, ManagerEvent::ScanError { .. })),
        1
    );
    let starts = radio
        .calls()
        .iter()
        .filter(|c| matches!(c, RadioCall::StartScan))
        .count();
    assert_eq!(starts, 1);
    assert!(!radio.push_advertisement("id-late", Some("Latecomer"), -30));
}

#[tokio::test(start_paused = true)]
async fn permission_failure_is_advisory_only() {
    let (radio, mut manager) = new_manager();
    radio.deny_permissions("bluetooth permission not granted");
    radio.queue_advertisement("id-a", Some("Teddy-ESP32"), -40);

    let mut notifications = manager.subscribe();
    manager.start_scan().await.unwrap();
    settle().await;

    assert!(manager.is_scanning());
    assert_eq!(manager.discovered_peripherals().len(), 1);

    let events = drain(&mut notifications);
    assert_eq!(
        count_matching(&events, |e| matches!(
            e,
            ManagerEvent::PermissionAdvisory { .. }
        )),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn connect_issues_stop_scan_first_even_when_idle() {
    let (radio, mut manager) = new_manager();

    let target = manager.connect("id-a").await.unwrap();
    assert_eq!(target.device_id, "id-a");
    assert_eq!(target.device_name, "Unknown Device");

    let calls = radio.calls();
    let stop_index = calls
        .iter()
        .position(|c| matches!(c, RadioCall::StopScan))
        .unwrap();
    let connect_index = calls
        .iter()
        .position(|c| matches!(c, RadioCall::Connect(_)))
        .unwrap();
    assert!(stop_index < connect_index);
    assert_eq!(manager.connected_peripheral_id().await, Some("id-a".into()));
}

#[tokio::test(start_paused = true)]
async fn connect_stops_an_active_scan() {
    let (radio, mut manager) = new_manager();
    radio.queue_advertisement("id-a", Some("Teddy-ESP32"), -40);

    manager.start_scan().await.unwrap();
    settle().await;
    assert!(manager.is_scanning());

    manager.connect("id-a").await.unwrap();
    assert!(!manager.is_scanning());
}

async fn assert_connect_failure(radio: &MockRadio, manager: &mut PairingManager<MockRadio>) {
    let mut notifications = manager.subscribe();
    let result = manager.connect("id-a").await;

    assert!(result.is_err());
    assert_eq!(manager.connected_peripheral_id().await, None);

    let events = drain(&mut notifications);
    assert_eq!(
        count_matching(&events, |e| matches!(
            e,
            ManagerEvent::ConnectFailure { .. }
        )),
        1
    );
    assert_eq!(
        count_matching(&events, |e| matches!(
            e,
            ManagerEvent::ConnectSuccess { .. }
        )),
        0
    );
    assert!(
        radio
            .calls()
            .iter()
            .any(|c| matches!(c, RadioCall::Connect(_)))
    );
}

#[tokio::test(start_paused = true)]
async fn connect_timeout_leaves_no_partial_state() {
    let (radio, mut manager) = new_manager();
    radio.set_connect_outcome(ConnectOutcome::Timeout);
    assert_connect_failure(&radio, &mut manager).await;
}

#[tokio::test(start_paused = true)]
async fn connect_error_leaves_no_partial_state() {
    let (radio, mut manager) = new_manager();
    radio.set_connect_outcome(ConnectOutcome::Failure("link setup refused".into()));
    assert_connect_failure(&radio, &mut manager).await;
}

#[tokio::test(start_paused = true)]
async fn service_discovery_failure_fails_the_connect() {
    let (radio, mut manager) = new_manager();
    radio.set_discovery(DiscoveryOutcome::Fail("gatt error".into()));
    assert_connect_failure(&radio, &mut manager).await;
}

#[tokio::test(start_paused = true)]
async fn service_discovery_hang_hits_the_timeout() {
    let (radio, mut manager) = new_manager();
    radio.set_discovery(DiscoveryOutcome::Hang);
    assert_connect_failure(&radio, &mut manager).await;
}

#[tokio::test(start_paused = true)]
async fn connect_failure_event_carries_the_display_name() {
    let (radio, mut manager) = new_manager();
    radio.queue_advertisement("id-a", Some("Teddy-ESP32"), -40);
    radio.set_connect_outcome(ConnectOutcome::Timeout);

    manager.start_scan().await.unwrap();
    settle().await;

    let mut notifications = manager.subscribe();
    let result = manager.connect("id-a").await;
    assert!(result.is_err());

    let events = drain(&mut notifications);
    let failure = events
        .iter()
        .find_map(|e| match e {
            ManagerEvent::ConnectFailure { name, reason } => Some((name.clone(), reason.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(failure.0, "Teddy-ESP32");
    assert!(failure.1.contains("timed out"));
}

#[tokio::test(start_paused = true)]
async fn transfer_unit_failure_is_swallowed() {
    let (radio, mut manager) = new_manager();
    radio.queue_advertisement("id-a", Some("Teddy-ESP32"), -40);
    radio.set_transfer_unit(TransferUnitOutcome::Fail("insufficient resources".into()));

    manager.start_scan().await.unwrap();
    settle().await;

    let mut notifications = manager.subscribe();
    let target = manager.connect("id-a").await.unwrap();
    assert_eq!(target.device_name, "Teddy-ESP32");
    assert_eq!(manager.connected_peripheral_id().await, Some("id-a".into()));

    let events = drain(&mut notifications);
    assert_eq!(
        count_matching(&events, |e| matches!(
            e,
            ManagerEvent::ConnectSuccess { .. }
        )),
        1
    );
    assert_eq!(
        count_matching(&events, |e| matches!(
            e,
            ManagerEvent::ConnectFailure { .. }
        )),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn disconnect_clears_state_even_when_the_adapter_errors() {
    let (radio, mut manager) = new_manager();
    manager.connect("id-a").await.unwrap();
    radio.set_cancel_error("bus fault");

    let mut notifications = manager.subscribe();
    manager.disconnect("id-a").await.unwrap();

    assert_eq!(manager.connected_peripheral_id().await, None);
    assert!(
        radio
            .calls()
            .iter()
            .any(|c| matches!(c, RadioCall::CancelConnection(id) if id == "id-a"))
    );

    let events = drain(&mut notifications);
    assert!(events.contains(&ManagerEvent::DisconnectComplete {
        id: "id-a".to_string()
    }));
}

#[tokio::test(start_paused = true)]
async fn disconnect_with_mismatched_id_keeps_local_state() {
    let (radio, mut manager) = new_manager();
    manager.connect("id-a").await.unwrap();

    manager.disconnect("id-b").await.unwrap();

    // The cancel request is still passed through; the radio is the source
    // of truth. Only a matching id clears the local slot.
    assert!(
        radio
            .calls()
            .iter()
            .any(|c| matches!(c, RadioCall::CancelConnection(id) if id == "id-b"))
    );
    assert_eq!(manager.connected_peripheral_id().await, Some("id-a".into()));
}

#[tokio::test(start_paused = true)]
async fn connecting_elsewhere_while_connected_is_rejected() {
    let (radio, mut manager) = new_manager();
    manager.connect("id-a").await.unwrap();

    let result = manager.connect("id-b").await;
    assert!(result.is_err());
    assert!(
        !radio
            .calls()
            .iter()
            .any(|c| matches!(c, RadioCall::Connect(id) if id == "id-b"))
    );
    assert_eq!(manager.connected_peripheral_id().await, Some("id-a".into()));
}

#[tokio::test(start_paused = true)]
async fn reconnecting_to_the_connected_peripheral_is_idempotent() {
    let (radio, mut manager) = new_manager();
    manager.connect("id-a").await.unwrap();

    let target = manager.connect("id-a").await.unwrap();
    assert_eq!(target.device_id, "id-a");

    let connects = radio
        .calls()
        .iter()
        .filter(|c| matches!(c, RadioCall::Connect(_)))
        .count();
    assert_eq!(connects, 1);
}

#[tokio::test(start_paused = true)]
async fn link_loss_clears_state_and_notifies() {
    let (radio, mut manager) = new_manager();
    manager.connect("id-a").await.unwrap();
    assert!(manager.verify_connection().await);

    radio.link_alive_handle().store(false, Ordering::SeqCst);

    let mut notifications = manager.subscribe();
    assert!(!manager.verify_connection().await);
    assert_eq!(manager.connected_peripheral_id().await, None);

    let events = drain(&mut notifications);
    assert_eq!(
        count_matching(&events, |e| matches!(
            e,
            ManagerEvent::DeviceLostConnection { .. }
        )),
        1
    );
}
