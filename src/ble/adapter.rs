//! Radio adapter contract.
//! The pairing manager talks to the platform BLE stack through these traits
//! only; `bluest.rs` provides the production implementation and `mock.rs` a
//! scripted one. The platform's persistent scan callback is modeled as a
//! channel owned by the scan session and dropped when the session ends, so a
//! previous session's events can never reach a successor.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::AdapterError;

/// One advertisement observation as reported by the radio.
#[derive(Debug, Clone)]
pub struct Advertisement {
    /// Platform-assigned peripheral identifier.
    pub id: String,
    /// Advertised name, if the peripheral carries one.
    pub local_name: Option<String>,
    /// MAC address where the platform embeds one in the identifier.
    pub address: Option<String>,
    /// Signal strength sample (dBm); 0 when the platform omits it.
    pub rssi: i16,
}

/// Events delivered on the scan channel.
#[derive(Debug)]
pub enum ScanEvent {
    Advertisement(Advertisement),
    Error(AdapterError),
}

/// Capability contract of the platform BLE radio.
#[async_trait]
pub trait BleRadio: Send + Sync + 'static {
    /// Best-effort permission/availability check. Failure is advisory only;
    /// callers proceed to scan regardless.
    async fn ensure_permissions(&self) -> Result<(), AdapterError>;

    /// Starts advertisement delivery and returns the event channel for this
    /// scan. An empty `filter` accepts all advertising peripherals. Errors
    /// occurring after start are delivered in-band as [`ScanEvent::Error`].
    async fn start_scan(
        &self,
        filter: &[Uuid],
    ) -> Result<mpsc::UnboundedReceiver<ScanEvent>, AdapterError>;

    /// Stops advertisement delivery. Safe to call when no scan is running.
    async fn stop_scan(&self) -> Result<(), AdapterError>;

    /// Connects to a peripheral by id, bounded by `timeout`.
    async fn connect(
        &self,
        id: &str,
        timeout: Duration,
    ) -> Result<Box<dyn PeripheralLink>, AdapterError>;

    /// Requests cancellation of a connection. The radio is the source of
    /// truth for teardown; callers treat the request itself as sufficient.
    async fn cancel_connection(&self, id: &str) -> Result<(), AdapterError>;
}

/// An established connection to a single peripheral.
#[async_trait]
pub trait PeripheralLink: Send + Sync {
    /// Negotiates a larger transfer unit. Best-effort: callers fall back to
    /// the adapter default on failure.
    async fn request_transfer_unit(&self, target: u16) -> Result<u16, AdapterError>;

    /// Discovers all services and characteristics on the link. Required
    /// before the link is considered usable.
    async fn discover_services(&self) -> Result<(), AdapterError>;

    /// Whether the underlying link is still up.
    async fn is_connected(&self) -> bool;
}
