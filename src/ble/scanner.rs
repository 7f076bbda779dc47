//! Scan session lifecycle.
//! Owns the scan task, the per-session cancellation token, and the
//! discovered-peripheral set. A session ends on explicit stop, on expiry of
//! the scan window, or on an adapter-reported error; whichever comes first
//! marks the session inactive and no further advertisements are accepted.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::ble::adapter::{Advertisement, BleRadio, ScanEvent};
use crate::ble::types::{PeripheralRecord, ScanSession};
use crate::events::{EventBus, ManagerEvent};

pub struct DeviceScanner<R: BleRadio> {
    radio: Arc<R>,
    discovered: Arc<Mutex<Vec<PeripheralRecord>>>,
    session: Arc<Mutex<Option<ScanSession>>>,
    cancel_token: CancellationToken,
    scan_task: Option<JoinHandle<()>>,
    events: EventBus,
    scan_window: Duration,
}

impl<R: BleRadio> DeviceScanner<R> {
    pub fn new(radio: Arc<R>, events: EventBus, scan_window: Duration) -> Self {
        Self {
            radio,
            discovered: Arc::new(Mutex::new(Vec::new())),
            session: Arc::new(Mutex::new(None)),
            cancel_token: CancellationToken::new(),
            scan_task: None,
            events,
            scan_window,
        }
    }

    /// Starts a new scan session, stopping any previous one first. The
    /// previous session's results are discarded. Returns as soon as the
    /// session task is running; results arrive through the event bus.
    pub async fn start_scan(&mut self) -> Result<()> {
        if self.scan_task.is_some() {
            self.stop_scan().await?;
        }
        self.discovered.lock().unwrap().clear();

        // A fresh token per session: cancelling it tears down both the event
        // loop and the window timer, so a stale timer cannot outlive the
        // session it belongs to.
        self.cancel_token = CancellationToken::new();
        *self.session.lock().unwrap() = Some(ScanSession::begin());

        let radio = self.radio.clone();
        let discovered = self.discovered.clone();
        let session = self.session.clone();
        let events = self.events.clone();
        let cancel_token = self.cancel_token.clone();
        let scan_window = self.scan_window;

        let handle = tokio::spawn(async move {
            Self::session_task(radio, discovered, session, events, cancel_token, scan_window)
                .await;
        });
        self.scan_task = Some(handle);

        self.events.publish(ManagerEvent::ScanStart);
        info!("Scan session started");
        Ok(())
    }

    async fn session_task(
        radio: Arc<R>,
        discovered: Arc<Mutex<Vec<PeripheralRecord>>>,
        session: Arc<Mutex<Option<ScanSession>>>,
        events: EventBus,
        cancel_token: CancellationToken,
        scan_window: Duration,
    ) {
        let mut scan_events = match radio.start_scan(&[]).await {
            Ok(receiver) => receiver,
            Err(e) => {
                error!("Failed to start scan: {}", e);
                Self::close_session(&session);
                events.publish(ManagerEvent::ScanError {
                    reason: e.to_string(),
                });
                return;
            }
        };

        let window = sleep(scan_window);
        tokio::pin!(window);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    // stop_scan does the bookkeeping for explicit stops.
                    return;
                }
                _ = &mut window => {
                    info!("Scan window expired, closing session");
                    if let Err(e) = radio.stop_scan().await {
                        warn!("Stop scan request failed: {}", e);
                    }
                    Self::close_session(&session);
                    events.publish(ManagerEvent::ScanComplete);
                    return;
                }
                event = scan_events.recv() => match event {
                    Some(ScanEvent::Advertisement(advertisement)) => {
                        if let Some((record, first_seen)) =
                            Self::upsert_record(&discovered, advertisement)
                        {
                            if first_seen {
                                info!(
                                    "Found device: {} ({}), RSSI {}",
                                    record.name, record.id, record.rssi
                                );
                                events.publish(ManagerEvent::DeviceFound { device: record });
                            } else {
                                debug!(
                                    "Updated device {}: RSSI {}",
                                    record.id, record.rssi
                                );
                                events.publish(ManagerEvent::DeviceUpdated { device: record });
                            }
                        }
                    }
                    Some(ScanEvent::Error(e)) => {
                        error!("Scan error reported by adapter: {}", e);
                        if let Err(stop_err) = radio.stop_scan().await {
                            warn!("Stop scan request failed: {}", stop_err);
                        }
                        Self::close_session(&session);
                        events.publish(ManagerEvent::ScanError {
                            reason: e.to_string(),
                        });
                        return;
                    }
                    None => {
                        info!("Scan event stream ended");
                        Self::close_session(&session);
                        events.publish(ManagerEvent::ScanComplete);
                        return;
                    }
                }
            }
        }
    }

    /// Stops the current session. The stop request is issued to the radio
    /// regardless of prior state; the radio treats a stop with no running
    /// scan as a no-op.
    pub async fn stop_scan(&mut self) -> Result<()> {
        self.cancel_token.cancel();

        if let Some(handle) = self.scan_task.take() {
            if let Err(e) = handle.await {
                if e.is_cancelled() {
                    info!("Scan task was cancelled");
                } else {
                    error!("Scan task ended with join error: {:?}", e);
                }
            }
        }

        if let Err(e) = self.radio.stop_scan().await {
            warn!("Stop scan request failed: {}", e);
        }
        Self::close_session(&self.session);
        self.events.publish(ManagerEvent::StopScanComplete);
        Ok(())
    }

    /// Records an advertisement in the discovered set. Unnamed peripherals
    /// are never surfaced. A re-observation refreshes the signal level in
    /// place and keeps the name and address from the first observation.
    /// Returns the resulting record and whether it was newly inserted.
    fn upsert_record(
        discovered: &Mutex<Vec<PeripheralRecord>>,
        advertisement: Advertisement,
    ) -> Option<(PeripheralRecord, bool)> {
        let name = advertisement.local_name.filter(|n| !n.is_empty())?;

        let mut records = discovered.lock().unwrap();
        if let Some(record) = records.iter_mut().find(|r| r.id == advertisement.id) {
            record.rssi = advertisement.rssi;
            return Some((record.clone(), false));
        }

        let record = PeripheralRecord {
            id: advertisement.id,
            name,
            address: advertisement.address,
            rssi: advertisement.rssi,
        };
        records.push(record.clone());
        Some((record, true))
    }

    fn close_session(session: &Mutex<Option<ScanSession>>) {
        if let Some(current) = session.lock().unwrap().as_mut() {
            if current.active {
                current.active = false;
                info!("Scan session closed after {:?}", current.started_at.elapsed());
            }
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.session
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.active)
            .unwrap_or(false)
    }

    /// The discovered set in discovery order.
    pub fn discovered(&self) -> Vec<PeripheralRecord> {
        self.discovered.lock().unwrap().clone()
    }

    pub fn display_name(&self, id: &str) -> Option<String> {
        self.discovered
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.name.clone())
    }
}
