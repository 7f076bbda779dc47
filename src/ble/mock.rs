//! Scripted radio adapter for tests and UI development.
//! Records every call it receives and plays back configured outcomes, so the
//! manager's lifecycle can be exercised without a physical radio. The app
//! shells use it to develop the pairing screens away from real hardware.

use std::future::pending;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ble::adapter::{Advertisement, BleRadio, PeripheralLink, ScanEvent};
use crate::error::AdapterError;

/// A call observed by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    EnsurePermissions,
    StartScan,
    StopScan,
    Connect(String),
    CancelConnection(String),
}

#[derive(Debug, Clone)]
pub enum ConnectOutcome {
    Success,
    Timeout,
    Failure(String),
}

#[derive(Debug, Clone)]
pub enum TransferUnitOutcome {
    Negotiated(u16),
    Unsupported,
    Fail(String),
}

#[derive(Debug, Clone)]
pub enum DiscoveryOutcome {
    Succeed,
    Fail(String),
    /// Never completes; exercises the discovery timeout.
    Hang,
}

pub struct MockRadio {
    queued: Mutex<Vec<ScanEvent>>,
    live_sender: Mutex<Option<mpsc::UnboundedSender<ScanEvent>>>,
    calls: Mutex<Vec<RadioCall>>,
    permission_denial: Mutex<Option<String>>,
    connect_outcome: Mutex<ConnectOutcome>,
    transfer_unit: Mutex<TransferUnitOutcome>,
    discovery: Mutex<DiscoveryOutcome>,
    cancel_error: Mutex<Option<String>>,
    link_alive: Arc<AtomicBool>,
}

impl Default for MockRadio {
    fn default() -> Self {
        Self {
            queued: Mutex::new(Vec::new()),
            live_sender: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            permission_denial: Mutex::new(None),
            connect_outcome: Mutex::new(ConnectOutcome::Success),
            transfer_unit: Mutex::new(TransferUnitOutcome::Negotiated(512)),
            discovery: Mutex::new(DiscoveryOutcome::Succeed),
            cancel_error: Mutex::new(None),
            link_alive: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advertisement(id: &str, name: Option<&str>, rssi: i16) -> ScanEvent {
        ScanEvent::Advertisement(Advertisement {
            id: id.to_string(),
            local_name: name.map(str::to_string),
            address: None,
            rssi,
        })
    }

    /// Queues an event for delivery as soon as the next scan starts.
    pub fn queue_event(&self, event: ScanEvent) {
        self.queued.lock().unwrap().push(event);
    }

    pub fn queue_advertisement(&self, id: &str, name: Option<&str>, rssi: i16) {
        self.queue_event(Self::advertisement(id, name, rssi));
    }

    pub fn queue_scan_error(&self, reason: &str) {
        self.queue_event(ScanEvent::Error(AdapterError::ScanFailed(
            reason.to_string(),
        )));
    }

    /// Injects an event into the running scan. Returns false when no scan is
    /// accepting events (never started, stopped, or the session dropped its
    /// receiver).
    pub fn push_event(&self, event: ScanEvent) -> bool {
        match self.live_sender.lock().unwrap().as_ref() {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    pub fn push_advertisement(&self, id: &str, name: Option<&str>, rssi: i16) -> bool {
        self.push_event(Self::advertisement(id, name, rssi))
    }

    pub fn deny_permissions(&self, reason: &str) {
        *self.permission_denial.lock().unwrap() = Some(reason.to_string());
    }

    pub fn set_connect_outcome(&self, outcome: ConnectOutcome) {
        *self.connect_outcome.lock().unwrap() = outcome;
    }

    pub fn set_transfer_unit(&self, outcome: TransferUnitOutcome) {
        *self.transfer_unit.lock().unwrap() = outcome;
    }

    pub fn set_discovery(&self, outcome: DiscoveryOutcome) {
        *self.discovery.lock().unwrap() = outcome;
    }

    pub fn set_cancel_error(&self, reason: &str) {
        *self.cancel_error.lock().unwrap() = Some(reason.to_string());
    }

    /// Handle for flipping the mock link's liveness from a test.
    pub fn link_alive_handle(&self) -> Arc<AtomicBool> {
        self.link_alive.clone()
    }

    pub fn calls(&self) -> Vec<RadioCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: RadioCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl BleRadio for MockRadio {
    async fn ensure_permissions(&self) -> Result<(), AdapterError> {
        self.record(RadioCall::EnsurePermissions);
        match self.permission_denial.lock().unwrap().as_ref() {
            Some(reason) => Err(AdapterError::PermissionDenied(reason.clone())),
            None => Ok(()),
        }
    }

    async fn start_scan(
        &self,
        _filter: &[Uuid],
    ) -> Result<mpsc::UnboundedReceiver<ScanEvent>, AdapterError> {
        self.record(RadioCall::StartScan);

        let (sender, receiver) = mpsc::unbounded_channel();
        for event in self.queued.lock().unwrap().drain(..) {
            let _ = sender.send(event);
        }
        *self.live_sender.lock().unwrap() = Some(sender);
        Ok(receiver)
    }

    async fn stop_scan(&self) -> Result<(), AdapterError> {
        self.record(RadioCall::StopScan);
        self.live_sender.lock().unwrap().take();
        Ok(())
    }

    async fn connect(
        &self,
        id: &str,
        connect_timeout: Duration,
    ) -> Result<Box<dyn PeripheralLink>, AdapterError> {
        self.record(RadioCall::Connect(id.to_string()));

        let outcome = self.connect_outcome.lock().unwrap().clone();
        match outcome {
            ConnectOutcome::Success => Ok(Box::new(MockLink {
                transfer_unit: self.transfer_unit.lock().unwrap().clone(),
                discovery: self.discovery.lock().unwrap().clone(),
                alive: self.link_alive.clone(),
            })),
            ConnectOutcome::Timeout => Err(AdapterError::ConnectTimeout(connect_timeout)),
            ConnectOutcome::Failure(reason) => Err(AdapterError::ConnectFailed(reason)),
        }
    }

    async fn cancel_connection(&self, id: &str) -> Result<(), AdapterError> {
        self.record(RadioCall::CancelConnection(id.to_string()));
        match self.cancel_error.lock().unwrap().as_ref() {
            Some(reason) => Err(AdapterError::DisconnectFailed(reason.clone())),
            None => Ok(()),
        }
    }
}

pub struct MockLink {
    transfer_unit: TransferUnitOutcome,
    discovery: DiscoveryOutcome,
    alive: Arc<AtomicBool>,
}

#[async_trait]
impl PeripheralLink for MockLink {
    async fn request_transfer_unit(&self, target: u16) -> Result<u16, AdapterError> {
        match &self.transfer_unit {
            TransferUnitOutcome::Negotiated(size) => Ok((*size).min(target)),
            TransferUnitOutcome::Unsupported => Err(AdapterError::TransferUnitUnsupported),
            TransferUnitOutcome::Fail(reason) => {
                Err(AdapterError::TransferUnitFailed(reason.clone()))
            }
        }
    }

    async fn discover_services(&self) -> Result<(), AdapterError> {
        match &self.discovery {
            DiscoveryOutcome::Succeed => Ok(()),
            DiscoveryOutcome::Fail(reason) => {
                Err(AdapterError::ServiceDiscoveryFailed(reason.clone()))
            }
            DiscoveryOutcome::Hang => {
                pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn is_connected(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}
