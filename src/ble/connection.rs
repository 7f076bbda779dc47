//! Connection pipeline.
//! Establishes a link in three stages: connect under the configured timeout,
//! best-effort transfer-unit negotiation, and required service discovery
//! under its own bound. Teardown issues the cancellation request and treats
//! the intent as sufficient: adapter errors on the cancel call are logged
//! and swallowed.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::time::timeout;

use crate::ble::adapter::{BleRadio, PeripheralLink};
use crate::error::AdapterError;

pub struct ConnectionManager<R: BleRadio> {
    radio: Arc<R>,
    connect_timeout: Duration,
    discovery_timeout: Duration,
    target_transfer_unit: u16,
}

impl<R: BleRadio> ConnectionManager<R> {
    pub fn new(
        radio: Arc<R>,
        connect_timeout: Duration,
        discovery_timeout: Duration,
        target_transfer_unit: u16,
    ) -> Self {
        Self {
            radio,
            connect_timeout,
            discovery_timeout,
            target_transfer_unit,
        }
    }

    /// Connects to the peripheral and prepares the link for use.
    ///
    /// Transfer-unit negotiation failures are logged and swallowed; the link
    /// proceeds at the adapter default. Service discovery is required and a
    /// failure there fails the whole attempt.
    pub async fn establish(&self, id: &str) -> Result<Box<dyn PeripheralLink>, AdapterError> {
        info!("Initiating connection to {}", id);
        let link = self.radio.connect(id, self.connect_timeout).await?;

        match link.request_transfer_unit(self.target_transfer_unit).await {
            Ok(negotiated) => info!("Negotiated transfer unit of {} bytes", negotiated),
            Err(e) => info!("Transfer unit request failed, using adapter default: {}", e),
        }

        info!("Connection established, discovering services...");
        match timeout(self.discovery_timeout, link.discover_services()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(AdapterError::ServiceDiscoveryTimeout(self.discovery_timeout)),
        }

        info!("Service discovery completed for {}", id);
        Ok(link)
    }

    /// Requests cancellation of the connection. Never fails from the
    /// caller's point of view.
    pub async fn teardown(&self, id: &str) {
        info!("Disconnecting from {}", id);
        if let Err(e) = self.radio.cancel_connection(id).await {
            warn!("Disconnect request for {} failed: {}", id, e);
        }
    }
}
