//! Production radio adapter backed by the `bluest` crate.
//! Keeps a map of platform device handles populated during scanning;
//! connects and disconnects go through the stored handle for the given id,
//! so an id that was never observed surfaces as a not-found error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bluest::{Adapter, Device};
use futures_util::StreamExt;
use log::{debug, info};
use regex::Regex;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::ble::adapter::{Advertisement, BleRadio, PeripheralLink, ScanEvent};
use crate::error::AdapterError;

pub struct BluestRadio {
    adapter: Adapter,
    /// Map of peripheral ids to platform device handles.
    devices: Arc<Mutex<HashMap<String, Device>>>,
    pump_cancel: Mutex<Option<CancellationToken>>,
}

impl BluestRadio {
    pub async fn new() -> Result<Self, AdapterError> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| AdapterError::AdapterUnavailable("no bluetooth adapter found".into()))?;
        adapter
            .wait_available()
            .await
            .map_err(|e| AdapterError::AdapterUnavailable(e.to_string()))?;
        info!("Bluetooth adapter is available");

        Ok(Self {
            adapter,
            devices: Arc::new(Mutex::new(HashMap::new())),
            pump_cancel: Mutex::new(None),
        })
    }

    fn lookup_device(&self, id: &str) -> Result<Device, AdapterError> {
        self.devices
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| AdapterError::PeripheralNotFound(id.to_string()))
    }

    fn extract_mac_address(device_id: &str) -> Option<String> {
        let re = Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").unwrap();
        re.find_iter(device_id)
            .last()
            .map(|m| m.as_str().to_uppercase())
    }

    async fn pump_scan(
        adapter: Adapter,
        filter: Vec<Uuid>,
        devices: Arc<Mutex<HashMap<String, Device>>>,
        sender: mpsc::UnboundedSender<ScanEvent>,
        cancel_token: CancellationToken,
    ) {
        let mut scan_stream = match adapter.scan(&filter).await {
            Ok(stream) => stream,
            Err(e) => {
                let _ = sender.send(ScanEvent::Error(AdapterError::ScanFailed(e.to_string())));
                return;
            }
        };

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                next = scan_stream.next() => match next {
                    Some(discovered) => {
                        let device = discovered.device;
                        let id = device.id().to_string();
                        let local_name = device.name().ok().filter(|n| !n.is_empty());
                        let rssi = discovered.rssi.unwrap_or(0);
                        let address = Self::extract_mac_address(&id);

                        debug!("Advertisement from {} (name {:?}, RSSI {})", id, local_name, rssi);
                        devices.lock().unwrap().insert(id.clone(), device);

                        let advertisement = Advertisement { id, local_name, address, rssi };
                        if sender.send(ScanEvent::Advertisement(advertisement)).is_err() {
                            break;
                        }
                    }
                    None => {
                        info!("Platform scan stream ended");
                        break;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl BleRadio for BluestRadio {
    async fn ensure_permissions(&self) -> Result<(), AdapterError> {
        self.adapter
            .wait_available()
            .await
            .map_err(|e| AdapterError::PermissionDenied(e.to_string()))
    }

    async fn start_scan(
        &self,
        filter: &[Uuid],
    ) -> Result<mpsc::UnboundedReceiver<ScanEvent>, AdapterError> {
        if let Some(previous) = self.pump_cancel.lock().unwrap().take() {
            previous.cancel();
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        *self.pump_cancel.lock().unwrap() = Some(cancel_token.clone());

        tokio::spawn(Self::pump_scan(
            self.adapter.clone(),
            filter.to_vec(),
            self.devices.clone(),
            sender,
            cancel_token,
        ));

        Ok(receiver)
    }

    async fn stop_scan(&self) -> Result<(), AdapterError> {
        if let Some(cancel_token) = self.pump_cancel.lock().unwrap().take() {
            cancel_token.cancel();
        }
        Ok(())
    }

    async fn connect(
        &self,
        id: &str,
        connect_timeout: Duration,
    ) -> Result<Box<dyn PeripheralLink>, AdapterError> {
        let device = self.lookup_device(id)?;

        if !device.is_connected().await {
            info!("Initiating platform connection to {}", id);
            match timeout(connect_timeout, self.adapter.connect_device(&device)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(AdapterError::ConnectFailed(e.to_string())),
                Err(_) => return Err(AdapterError::ConnectTimeout(connect_timeout)),
            }
        }

        Ok(Box::new(BluestLink { device }))
    }

    async fn cancel_connection(&self, id: &str) -> Result<(), AdapterError> {
        let device = self.lookup_device(id)?;
        if device.is_connected().await {
            self.adapter
                .disconnect_device(&device)
                .await
                .map_err(|e| AdapterError::DisconnectFailed(e.to_string()))?;
            info!("Disconnected from {}", id);
        } else {
            info!("Device {} not connected", id);
        }
        Ok(())
    }
}

pub struct BluestLink {
    device: Device,
}

#[async_trait]
impl PeripheralLink for BluestLink {
    async fn request_transfer_unit(&self, _target: u16) -> Result<u16, AdapterError> {
        // The platform stack performs the MTU exchange during connection;
        // bluest exposes no explicit request call.
        Err(AdapterError::TransferUnitUnsupported)
    }

    async fn discover_services(&self) -> Result<(), AdapterError> {
        let services = self
            .device
            .services()
            .await
            .map_err(|e| AdapterError::ServiceDiscoveryFailed(e.to_string()))?;

        for service in &services {
            let characteristics = service
                .characteristics()
                .await
                .map_err(|e| AdapterError::ServiceDiscoveryFailed(e.to_string()))?;
            debug!(
                "Service {}: {} characteristics",
                service.uuid(),
                characteristics.len()
            );
        }

        info!("Discovered {} services", services.len());
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.device.is_connected().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_extraction_from_platform_ids() {
        assert_eq!(
            BluestRadio::extract_mac_address("dev/hci0/aa:bb:cc:dd:ee:ff"),
            Some("AA:BB:CC:DD:EE:FF".to_string())
        );
        assert_eq!(
            BluestRadio::extract_mac_address("12-34-56-78-9a-bc"),
            Some("12-34-56-78-9A-BC".to_string())
        );
        assert_eq!(
            BluestRadio::extract_mac_address("E5A3F2B1-9C6D-4E2A-8F1B-0C7D6E5F4A3B"),
            None
        );
    }
}
