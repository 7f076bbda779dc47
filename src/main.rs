//! Demo binary for the pairing core: scans for nearby peripherals, prints
//! every notification as a JSON line, and optionally connects to the device
//! id given as the first argument.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{info, warn};

use teddy_link::ble::BluestRadio;
use teddy_link::{PairingConfig, PairingManager};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let radio = Arc::new(BluestRadio::new().await?);
    let mut manager = PairingManager::new(radio, PairingConfig::default());

    let mut notifications = manager.subscribe();
    tokio::spawn(async move {
        while let Ok(notification) = notifications.recv().await {
            match serde_json::to_string(&notification) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to serialize notification: {}", e),
            }
        }
    });

    manager.start_scan().await?;
    while manager.is_scanning() {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    let devices = manager.discovered_peripherals();
    info!("Scan finished with {} device(s)", devices.len());
    for device in &devices {
        info!(
            "  {} [{}] RSSI {} ({:?})",
            device.name,
            device.id,
            device.rssi,
            device.signal_strength()
        );
    }

    if let Some(target_id) = env::args().nth(1) {
        let target = manager.connect(&target_id).await?;
        info!(
            "Connected to {}, ready for WiFi provisioning",
            target.device_name
        );
        manager.disconnect(&target.device_id).await?;
    }

    Ok(())
}
