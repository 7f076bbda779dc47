//! Handoff contract with the WiFi provisioning flow.
//! On a successful connection the pairing manager produces a
//! [`ProvisioningTarget`]; that is the sole input the provisioning screens
//! need. No link object crosses this boundary: provisioning addresses the
//! device by id over the same connection the manager owns.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// GATT service the Teddy controller exposes for WiFi provisioning.
pub const UUID_PROVISIONING_SERVICE: Uuid = Uuid::from_u128(0x54656464_7950_6c75_7368_50726f760001);

/// Characteristic accepting the network credentials payload.
pub const UUID_PROVISIONING_CREDENTIALS_CHAR: Uuid =
    Uuid::from_u128(0x54656464_7950_6c75_7368_50726f760002);

/// Characteristic reporting provisioning status back to the phone.
pub const UUID_PROVISIONING_STATUS_CHAR: Uuid =
    Uuid::from_u128(0x54656464_7950_6c75_7368_50726f760003);

/// The connected device as handed to the provisioning flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningTarget {
    pub device_id: String,
    pub device_name: String,
}

/// What the provisioning flow reports back once the device is on the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningOutcome {
    pub device_name: String,
    pub ip_address: String,
}
