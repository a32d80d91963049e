use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, error, info};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::transport::BleTransport;
use crate::core::bluetooth::types::DiscoveredDevice;
use crate::error::ScanError;

/// Single-assignment latch holding the device a discovery run settled on.
#[derive(Debug, Default)]
pub struct DeviceClaim {
    device: Option<DiscoveredDevice>,
}

impl DeviceClaim {
    pub fn get(&self) -> Option<&DiscoveredDevice> {
        self.device.as_ref()
    }

    /// Records `device` unless a device is already claimed. Returns whether it was recorded.
    pub fn claim(&mut self, device: DiscoveredDevice) -> bool {
        if self.device.is_some() {
            return false;
        }
        self.device = Some(device);
        true
    }
}

/// Time-bounded discovery that remembers the first device it matched.
#[derive(Debug, Default)]
pub struct BluetoothScanner {
    claim: DeviceClaim,
}

impl BluetoothScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claimed(&self) -> Option<&DiscoveredDevice> {
        self.claim.get()
    }

    /// Scans for up to `timeout` and returns the first device whose name satisfies `predicate`.
    ///
    /// Once a device has been claimed, further calls return it without scanning.
    /// Transport failures are logged and reported as "no match".
    pub async fn discover<T, P>(
        &mut self,
        transport: &T,
        predicate: P,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Option<DiscoveredDevice>
    where
        T: BleTransport + ?Sized,
        P: Fn(Option<&str>) -> bool,
    {
        if let Some(device) = self.claim.get() {
            debug!("Device already claimed: {}, skipping scan", device.id);
            return Some(device.clone());
        }

        match Self::scan_for_match(transport, &predicate, timeout, cancel).await {
            Ok(Some(device)) => {
                if self.claim.claim(device.clone()) {
                    info!(target: "ble", "Device found: {} - {}", device.display_name(), device.address);
                }
                Some(device)
            }
            Ok(None) => None,
            Err(e) => {
                error!("BLE Scan Error: {}", e);
                None
            }
        }
    }

    async fn scan_for_match<T, P>(
        transport: &T,
        predicate: &P,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<DiscoveredDevice>, ScanError>
    where
        T: BleTransport + ?Sized,
        P: Fn(Option<&str>) -> bool,
    {
        debug!("Starting bluetooth scan for {:?}", timeout);
        let mut scan_stream = transport.scan().await?;
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        let mut stream_open = true;

        // Process discovered devices in arrival order until the window closes
        loop {
            tokio::select! {
                result = scan_stream.next(), if stream_open => {
                    match result {
                        Some(Ok(device)) => {
                            debug!("Found device - Name: {:?}, ID: {}, RSSI: {:?}", device.name, device.id, device.rssi);
                            if predicate(device.name.as_deref()) {
                                return Ok(Some(device));
                            }
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            debug!("Bluetooth scan stream has ended, waiting out the scan window");
                            stream_open = false;
                        }
                    }
                }
                _ = &mut deadline => {
                    debug!("Scan window elapsed without a match");
                    return Ok(None);
                }
                _ = cancel.cancelled() => {
                    info!("Scan cancelled");
                    return Ok(None);
                }
            }
        }
    }
}
