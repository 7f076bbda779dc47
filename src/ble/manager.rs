//! Pairing manager.
//! The single owner of the radio handle. Mediates between the presentation
//! layer and the BLE adapter: scan sessions, the discovered set, and the
//! connect/disconnect lifecycle for at most one peripheral at a time.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use log::{info, warn};
use tokio::sync::{Mutex, broadcast};

use crate::ble::adapter::BleRadio;
use crate::ble::connection::ConnectionManager;
use crate::ble::constants::{EVENT_BUS_CAPACITY, FALLBACK_DEVICE_NAME};
use crate::ble::scanner::DeviceScanner;
use crate::ble::types::{ConnectedPeripheral, PeripheralRecord};
use crate::config::PairingConfig;
use crate::events::{EventBus, ManagerEvent, Notification};
use crate::provision::ProvisioningTarget;

/// Manages BLE discovery and the connection lifecycle.
pub struct PairingManager<R: BleRadio> {
    radio: Arc<R>,
    scanner: DeviceScanner<R>,
    connection: ConnectionManager<R>,
    /// Currently connected peripheral, if any.
    connected: Arc<Mutex<Option<ConnectedPeripheral>>>,
    events: EventBus,
}

impl<R: BleRadio> PairingManager<R> {
    pub fn new(radio: Arc<R>, config: PairingConfig) -> Self {
        let events = EventBus::new(EVENT_BUS_CAPACITY);
        let scanner = DeviceScanner::new(radio.clone(), events.clone(), config.scan_window());
        let connection = ConnectionManager::new(
            radio.clone(),
            config.connect_timeout(),
            config.service_discovery_timeout(),
            config.target_transfer_unit,
        );

        Self {
            radio,
            scanner,
            connection,
            connected: Arc::new(Mutex::new(None)),
            events,
        }
    }

    /// Subscribes to the manager's notification stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events.subscribe()
    }

    /// Starts a scan session, replacing any session already running.
    ///
    /// Permissions are checked best-effort first: a failure is surfaced as
    /// an advisory notification and scanning proceeds anyway.
    pub async fn start_scan(&mut self) -> Result<()> {
        if let Err(e) = self.radio.ensure_permissions().await {
            warn!("Permission check failed, scanning anyway: {}", e);
            self.events.publish(ManagerEvent::PermissionAdvisory {
                reason: e.to_string(),
            });
        }
        self.scanner.start_scan().await
    }

    pub async fn stop_scan(&mut self) -> Result<()> {
        self.scanner.stop_scan().await
    }

    /// Connects to a discovered peripheral and hands back the provisioning
    /// target on success.
    ///
    /// A scan and a connection attempt never run concurrently: any active
    /// session is stopped before the connect request is issued. Connecting
    /// while a different peripheral is connected is rejected; the caller
    /// must disconnect first. Reconnecting to the already-connected
    /// peripheral is an idempotent success.
    pub async fn connect(&mut self, device_id: &str) -> Result<ProvisioningTarget> {
        self.scanner.stop_scan().await?;

        {
            let connected = self.connected.lock().await;
            if let Some(current) = connected.as_ref() {
                if current.id == device_id {
                    info!("Device {} already connected", device_id);
                    return Ok(ProvisioningTarget {
                        device_id: current.id.clone(),
                        device_name: current.name.clone(),
                    });
                }
                return Err(anyhow!(
                    "another peripheral is already connected: {}",
                    current.id
                ));
            }
        }

        // The id is passed through even when it is no longer in the
        // discovered set; the radio is authoritative and surfaces the
        // failure for a stale or unknown id.
        let name = self
            .scanner
            .display_name(device_id)
            .unwrap_or_else(|| FALLBACK_DEVICE_NAME.to_string());

        match self.connection.establish(device_id).await {
            Ok(link) => {
                *self.connected.lock().await = Some(ConnectedPeripheral {
                    id: device_id.to_string(),
                    name: name.clone(),
                    link,
                });
                info!("Device {} connected and stored", device_id);
                self.events.publish(ManagerEvent::ConnectSuccess {
                    id: device_id.to_string(),
                    name: name.clone(),
                });
                Ok(ProvisioningTarget {
                    device_id: device_id.to_string(),
                    device_name: name,
                })
            }
            Err(e) => {
                *self.connected.lock().await = None;
                let reason = e.to_string();
                self.events.publish(ManagerEvent::ConnectFailure {
                    name: name.clone(),
                    reason,
                });
                Err(anyhow::Error::from(e).context(format!("could not connect to {}", name)))
            }
        }
    }

    /// Disconnects from a peripheral. Adapter errors on the cancellation
    /// call are swallowed: once the request has been issued the device is
    /// considered disconnected from the app's point of view. The local
    /// connected slot is cleared when `device_id` matches it.
    pub async fn disconnect(&mut self, device_id: &str) -> Result<()> {
        self.connection.teardown(device_id).await;

        {
            let mut connected = self.connected.lock().await;
            if connected.as_ref().map(|c| c.id == device_id).unwrap_or(false) {
                *connected = None;
                info!("Connected state cleared for {}", device_id);
            }
        }

        self.events.publish(ManagerEvent::DisconnectComplete {
            id: device_id.to_string(),
        });
        Ok(())
    }

    /// Checks the stored link against the adapter's liveness signal. When
    /// the link is gone the connected state is cleared and a lost-connection
    /// notification is emitted.
    pub async fn verify_connection(&mut self) -> bool {
        let mut connected = self.connected.lock().await;
        let alive = match connected.as_ref() {
            Some(current) => current.link.is_connected().await,
            None => return false,
        };
        if alive {
            return true;
        }

        if let Some(lost) = connected.take() {
            warn!("Device {} lost its connection", lost.id);
            drop(connected);
            self.events.publish(ManagerEvent::DeviceLostConnection {
                id: lost.id,
                name: lost.name,
            });
        }
        false
    }

    pub fn is_scanning(&self) -> bool {
        self.scanner.is_scanning()
    }

    /// The discovered set in discovery order.
    pub fn discovered_peripherals(&self) -> Vec<PeripheralRecord> {
        self.scanner.discovered()
    }

    pub async fn connected_peripheral_id(&self) -> Option<String> {
        self.connected.lock().await.as_ref().map(|c| c.id.clone())
    }

    pub async fn connected_peripheral_name(&self) -> Option<String> {
        self.connected.lock().await.as_ref().map(|c| c.name.clone())
    }
}
