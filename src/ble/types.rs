//! Shared data structures for the pairing core.

use serde::Serialize;
use tokio::time::Instant;

use crate::ble::adapter::PeripheralLink;
use crate::ble::constants::{SIGNAL_MEDIUM_DBM, SIGNAL_STRONG_DBM};

/// A discovered BLE peripheral as surfaced to the presentation layer.
///
/// At most one record per `id` exists in the discovered set; a re-observation
/// refreshes `rssi` in place and keeps the name from the first observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeripheralRecord {
    /// Platform-assigned identifier, stable for the lifetime of the advertisement.
    pub id: String,
    /// Advertised name. Unnamed peripherals are never recorded.
    pub name: String,
    /// MAC address extracted from the id where the platform embeds one.
    pub address: Option<String>,
    /// Most recent signal strength sample (dBm).
    pub rssi: i16,
}

impl PeripheralRecord {
    pub fn signal_strength(&self) -> SignalStrength {
        SignalStrength::classify(self.rssi)
    }
}

/// Presentation-only signal strength bucket. Carries no protocol meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStrength {
    Strong,
    Medium,
    Weak,
}

impl SignalStrength {
    /// Classifies a signal level in dBm.
    pub fn classify(rssi: i16) -> Self {
        if rssi > SIGNAL_STRONG_DBM {
            SignalStrength::Strong
        } else if rssi > SIGNAL_MEDIUM_DBM {
            SignalStrength::Medium
        } else {
            SignalStrength::Weak
        }
    }
}

/// One scan session. At most one is active at a time; the scanner replaces
/// the session (and its cancellation token) wholesale on restart so a stale
/// timer can never close a successor session.
#[derive(Debug, Clone)]
pub struct ScanSession {
    pub started_at: Instant,
    pub active: bool,
}

impl ScanSession {
    pub fn begin() -> Self {
        Self {
            started_at: Instant::now(),
            active: true,
        }
    }
}

/// The currently connected peripheral and its live link handle.
/// The manager is the sole owner of the link; downstream flows address the
/// device by id only.
pub struct ConnectedPeripheral {
    pub id: String,
    pub name: String,
    pub link: Box<dyn PeripheralLink>,
}
