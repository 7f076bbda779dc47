//! Error types for the pairing core.
//! Every failure the radio adapter can report is folded into this taxonomy;
//! nothing below the adapter boundary leaks to the presentation layer.

use std::time::Duration;

use thiserror::Error;

/// Errors reported by a BLE radio adapter.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("bluetooth permission denied: {0}")]
    PermissionDenied(String),

    #[error("bluetooth adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("scan failed: {0}")]
    ScanFailed(String),

    #[error("peripheral not found: {0}")]
    PeripheralNotFound(String),

    #[error("connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("connection failed: {0}")]
    ConnectFailed(String),

    #[error("service discovery failed: {0}")]
    ServiceDiscoveryFailed(String),

    #[error("service discovery timed out after {0:?}")]
    ServiceDiscoveryTimeout(Duration),

    #[error("transfer unit negotiation is not supported by this adapter")]
    TransferUnitUnsupported,

    #[error("transfer unit negotiation failed: {0}")]
    TransferUnitFailed(String),

    #[error("disconnect failed: {0}")]
    DisconnectFailed(String),
}
