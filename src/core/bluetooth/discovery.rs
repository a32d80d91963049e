//! Discovery retry loop
//! Scans repeatedly, backing off between attempts, until the target device is claimed.

use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::constants::{
    DISCOVERY_BACKOFF_MULTIPLIER, DISCOVERY_INITIAL_BACKOFF_MS, DISCOVERY_MAX_BACKOFF_MS,
};
use crate::core::bluetooth::device::DeviceMatcher;
use crate::core::bluetooth::scanner::BluetoothScanner;
use crate::core::bluetooth::transport::BleTransport;
use crate::core::bluetooth::types::DiscoveredDevice;
use crate::error::SessionError;

/// Backoff between discovery attempts and optional bounds on the whole loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay after the first failed attempt
    pub initial_backoff_ms: u64,
    /// Cap for the delay
    pub max_backoff_ms: u64,
    /// Growth factor applied after every failed attempt
    pub multiplier: f64,
    /// Give up after this many attempts. `None` keeps scanning.
    pub max_attempts: Option<u32>,
    /// Give up once this much time has passed. `None` keeps scanning.
    pub max_duration_secs: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff_ms: DISCOVERY_INITIAL_BACKOFF_MS,
            max_backoff_ms: DISCOVERY_MAX_BACKOFF_MS,
            multiplier: DISCOVERY_BACKOFF_MULTIPLIER,
            max_attempts: None,
            max_duration_secs: None,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after `attempts` failed attempts (1-based).
    pub fn backoff(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay = self.initial_backoff_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        let capped = delay.min(self.max_backoff_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// True once another attempt is not allowed.
    pub fn is_exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        if self.max_attempts.is_some_and(|max| attempts >= max) {
            return true;
        }
        self.max_duration_secs
            .is_some_and(|max| elapsed >= Duration::from_secs(max))
    }
}

/// Runs scans with `scanner` until a device matching `matcher` is claimed.
///
/// Returns `Ok(None)` when `cancel` fires first.
pub async fn discover_until_found<T>(
    scanner: &mut BluetoothScanner,
    transport: &T,
    matcher: &DeviceMatcher,
    scan_window: Duration,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<Option<DiscoveredDevice>, SessionError>
where
    T: BleTransport + ?Sized,
{
    let started = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        if let Some(device) = scanner
            .discover(transport, |name| matcher.matches(name), scan_window, cancel)
            .await
        {
            info!(target: "ble", "Device is nearby after {} scan attempt(s)", attempts);
            return Ok(Some(device));
        }
        if cancel.is_cancelled() {
            return Ok(None);
        }
        if attempts == 1 {
            info!(target: "ble", "Waiting for device to be nearby...");
        }
        if policy.is_exhausted(attempts, started.elapsed()) {
            return Err(SessionError::DiscoveryExhausted { attempts });
        }

        let delay = policy.backoff(attempts);
        debug!("Scan attempt {} found nothing, retrying in {:?}", attempts, delay);
        tokio::select! {
            _ = sleep(delay) => {}
            _ = cancel.cancelled() => return Ok(None),
        }
    }
}
