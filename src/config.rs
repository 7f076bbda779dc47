//! Pairing configuration.
//! Tunables for the scan and connection lifecycle. The defaults match the
//! behavior of the production mobile app; embedders can deserialize overrides
//! from their own settings storage.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ble::constants::{
    CONNECT_TIMEOUT_SECS, SCAN_WINDOW_SECS, SERVICE_DISCOVERY_TIMEOUT_SECS, TARGET_TRANSFER_UNIT,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingConfig {
    /// Maximum duration of a scan session in seconds. The session is closed
    /// when this window expires no matter how many peripherals were found.
    pub scan_window_secs: u64,

    /// Upper bound on a single connection attempt in seconds.
    pub connect_timeout_secs: u64,

    /// Upper bound on service discovery after the link is up, in seconds.
    pub service_discovery_timeout_secs: u64,

    /// Transfer unit (MTU) size requested after connecting, in bytes.
    /// The request is best-effort; the link falls back to the adapter
    /// default when negotiation fails.
    pub target_transfer_unit: u16,
}

impl Default for PairingConfig {
    fn default() -> Self {
        PairingConfig {
            scan_window_secs: SCAN_WINDOW_SECS,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            service_discovery_timeout_secs: SERVICE_DISCOVERY_TIMEOUT_SECS,
            target_transfer_unit: TARGET_TRANSFER_UNIT,
        }
    }
}

impl PairingConfig {
    pub fn scan_window(&self) -> Duration {
        Duration::from_secs(self.scan_window_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn service_discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.service_discovery_timeout_secs)
    }
}
