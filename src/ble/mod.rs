//! Bluetooth functionality for the Teddy pairing core.
//! This module handles all bluetooth operations including scanning,
//! connecting, and disconnecting from the toy's embedded controller.

pub mod adapter;
pub mod bluest;
pub mod connection;
pub mod constants;
pub mod manager;
pub mod mock;
pub mod scanner;
pub mod types;

// Re-export types that should be publicly accessible
pub use adapter::{Advertisement, BleRadio, PeripheralLink, ScanEvent};
pub use self::bluest::BluestRadio;
pub use connection::ConnectionManager;
pub use manager::PairingManager;
pub use scanner::DeviceScanner;
pub use types::{ConnectedPeripheral, PeripheralRecord, ScanSession, SignalStrength};
