use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::bluetooth::constants::{
    BLUETOOTH_OPERATION_TIMEOUT_SECS, DEFAULT_SCAN_DURATION_SECS,
};
use crate::core::bluetooth::discovery::RetryPolicy;

/// Scan window, link timeouts and the discovery retry policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Length of one scan, in seconds
    pub scan_timeout_secs: u64,

    /// Limit for connecting and for GATT discovery, in seconds
    pub operation_timeout_secs: u64,

    pub retry: RetryPolicy,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            scan_timeout_secs: DEFAULT_SCAN_DURATION_SECS,
            operation_timeout_secs: BLUETOOTH_OPERATION_TIMEOUT_SECS,
            retry: RetryPolicy::default(),
        }
    }
}

impl DiscoveryConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}
