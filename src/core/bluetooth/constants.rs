//! Constants used throughout the application
//! This module contains the default values used when no configuration
//! overrides them, and the fixed parts of the wire format.

/// Advertised name (substring) of the Tone Equalizer
pub const DEFAULT_DEVICE_NAME: &str = "Tone Equalizer";

/// Scan duration in seconds
pub const DEFAULT_SCAN_DURATION_SECS: u64 = 5;

/// Timeout for connect and GATT discovery in seconds
pub const BLUETOOTH_OPERATION_TIMEOUT_SECS: u64 = 10;

/// First delay between discovery attempts in milliseconds
pub const DISCOVERY_INITIAL_BACKOFF_MS: u64 = 500;

/// Upper bound for the delay between discovery attempts in milliseconds
pub const DISCOVERY_MAX_BACKOFF_MS: u64 = 30_000;

/// Growth factor of the discovery backoff
pub const DISCOVERY_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Prefix of the initial state frame ("vol:<N>")
pub const VOLUME_FRAME_PREFIX: &str = "vol:";

/// Volume range accepted by the device and the host
pub const MIN_VOLUME: i64 = 0;
pub const MAX_VOLUME: i64 = 100;

/// Volume reported by hosts without a volume backend
pub const DEFAULT_FALLBACK_VOLUME: u8 = 50;

/// Payload key carrying the requested volume
pub const PAYLOAD_VALUE_KEY: &str = "value";

/// Capacity of the channels bridging transport streams
pub const STREAM_CHANNEL_CAPACITY: usize = 32;
