//! Teddy pairing core.
//! Discovery and connection lifecycle for pairing a Teddy smart-toy device
//! with a phone: scan for nearby BLE peripherals, connect to one, then hand
//! the device off to the WiFi provisioning flow. The presentation layer
//! consumes the notification stream and drives the manager's operations.

// Module declarations
pub mod ble;
pub mod config;
pub mod error;
pub mod events;
pub mod provision;

pub use ble::{BleRadio, BluestRadio, PairingManager, PeripheralRecord, SignalStrength};
pub use config::PairingConfig;
pub use error::AdapterError;
pub use events::{EventBus, ManagerEvent, Notification};
pub use provision::{ProvisioningOutcome, ProvisioningTarget};
