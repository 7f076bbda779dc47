//! Notification events exposed to the presentation layer.
//! The pairing manager publishes every observable state change on a broadcast
//! bus; the mobile shell subscribes for the lifetime of the pairing screens
//! and renders from the stream. Payloads are serde-serializable so they can
//! cross an FFI or IPC boundary as JSON.

use chrono::Local;
use log::debug;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::ble::types::PeripheralRecord;

/// State-change events emitted by the pairing manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ManagerEvent {
    /// A scan session has started.
    ScanStart,
    /// A named peripheral was observed for the first time this session.
    DeviceFound { device: PeripheralRecord },
    /// A known peripheral was re-observed; its signal level was refreshed.
    DeviceUpdated { device: PeripheralRecord },
    /// The adapter reported a mid-scan failure; the session was terminated.
    ScanError { reason: String },
    /// The scan session ended on its own (window expiry or stream end).
    ScanComplete,
    /// An explicit stop request completed.
    StopScanComplete,
    /// Permissions could not be confirmed; scanning proceeds best-effort.
    PermissionAdvisory { reason: String },
    ConnectSuccess { id: String, name: String },
    ConnectFailure { name: String, reason: String },
    DisconnectComplete { id: String },
    /// The adapter reports the connected link is gone.
    DeviceLostConnection { id: String, name: String },
}

/// A timestamped event as delivered to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub timestamp: String,
    #[serde(flatten)]
    pub event: ManagerEvent,
}

/// Broadcast bus carrying [`Notification`]s to however many subscribers the
/// presentation layer registers. Publishing never fails: a send with no live
/// subscribers is dropped.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Notification>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ManagerEvent) {
        let notification = Notification {
            timestamp: Local::now().to_rfc3339(),
            event,
        };
        if self.sender.send(notification).is_err() {
            debug!("No event subscribers; notification dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::types::PeripheralRecord;

    #[test]
    fn events_serialize_with_kebab_case_tags() {
        let event = ManagerEvent::DeviceFound {
            device: PeripheralRecord {
                id: "id-1".to_string(),
                name: "Teddy-ESP32".to_string(),
                address: None,
                rssi: -42,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "device-found");
        assert_eq!(json["device"]["name"], "Teddy-ESP32");

        let event = ManagerEvent::StopScanComplete;
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "stop-scan-complete");
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new(8);
        bus.publish(ManagerEvent::ScanStart);
    }
}
