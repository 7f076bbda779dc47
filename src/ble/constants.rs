//! Constants used throughout the pairing core.
//! Timeouts, thresholds, and other fixed values shared by the scanner and
//! connection pipeline.

/// Scan session window in seconds. A session is closed when this expires,
/// regardless of how many peripherals were found.
pub const SCAN_WINDOW_SECS: u64 = 10;

/// Timeout for a single connection attempt in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Timeout for service discovery after the link is established, in seconds.
pub const SERVICE_DISCOVERY_TIMEOUT_SECS: u64 = 10;

/// Transfer unit (MTU) size requested after connecting, in bytes.
/// Large enough to carry a WiFi credentials payload in one exchange.
pub const TARGET_TRANSFER_UNIT: u16 = 512;

/// Signal levels above this are classified as strong (dBm).
pub const SIGNAL_STRONG_DBM: i16 = -50;

/// Signal levels above this (and not strong) are classified as medium (dBm).
pub const SIGNAL_MEDIUM_DBM: i16 = -70;

/// Display name used when a connect target is no longer in the discovered set.
pub const FALLBACK_DEVICE_NAME: &str = "Unknown Device";

/// Capacity of the notification broadcast channel.
pub const EVENT_BUS_CAPACITY: usize = 64;
