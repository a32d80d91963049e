//! Transport backed by the `bluest` library

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use bluest::{Adapter, AdvertisingDevice, Characteristic, CharacteristicProperties, Device};
use futures_util::{stream, StreamExt};
use log::{debug, error, info};
use regex::Regex;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::core::bluetooth::constants::STREAM_CHANNEL_CAPACITY;
use crate::core::bluetooth::transport::{
    BleSession, BleTransport, DeviceStream, NotificationStream,
};
use crate::core::bluetooth::types::{
    Capabilities, Capability, CharacteristicRef, DiscoveredDevice, GattService, NotificationFrame,
};
use crate::error::TransportError;

static MAC_ADDRESS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").ok());

/// Pulls the MAC address out of a platform device id, when the platform exposes one.
pub fn extract_mac_address(device_id: &str) -> Option<String> {
    MAC_ADDRESS
        .as_ref()?
        .find_iter(device_id)
        .last()
        .map(|m| m.as_str().to_uppercase())
}

/// Maps GATT properties onto the capabilities the navigator understands.
pub fn capabilities_from_properties(properties: &CharacteristicProperties) -> Capabilities {
    [
        (properties.read, Capability::Read),
        (properties.write, Capability::Write),
        (properties.write_without_response, Capability::WriteWithoutResponse),
        (properties.notify, Capability::Notify),
        (properties.indicate, Capability::Indicate),
    ]
    .into_iter()
    .filter(|(supported, _)| *supported)
    .map(|(_, capability)| capability)
    .collect()
}

fn describe(
    device: &Device,
    advertised_name: Option<String>,
    rssi: Option<i16>,
) -> DiscoveredDevice {
    let id = device.id().to_string();
    let name = advertised_name.or_else(|| device.name().ok());
    let address = extract_mac_address(&id).unwrap_or_else(|| "N/A".to_string());
    DiscoveredDevice::new(name, address, id, rssi)
}

/// Device handles surfaced by the most recent scan, keyed by platform id.
/// Starting a scan forgets everything the previous one saw.
#[derive(Debug)]
struct DeviceRegistry<D> {
    devices: Mutex<HashMap<String, D>>,
}

impl<D: Clone> DeviceRegistry<D> {
    fn new() -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
        }
    }

    /// Drops every handle and returns how many were held
    async fn reset(&self) -> usize {
        let mut devices = self.devices.lock().await;
        let dropped = devices.len();
        devices.clear();
        dropped
    }

    async fn remember(&self, id: &str, device: D) {
        self.devices.lock().await.insert(id.to_string(), device);
    }

    async fn get(&self, id: &str) -> Option<D> {
        self.devices.lock().await.get(id).cloned()
    }
}

/// Bluetooth transport over the system adapter
#[derive(Clone)]
pub struct BluestTransport {
    adapter: Adapter,
    devices: Arc<DeviceRegistry<Device>>,
}

impl BluestTransport {
    /// Opens the default adapter and waits until it is powered on.
    pub async fn new() -> Result<Self, TransportError> {
        let adapter = Adapter::default()
            .await
            .ok_or(TransportError::AdapterUnavailable)?;
        adapter.wait_available().await?;
        info!("Bluetooth adapter is available.");
        Ok(Self {
            adapter,
            devices: Arc::new(DeviceRegistry::new()),
        })
    }

    /// Scans for Bluetooth devices and forwards them until the receiver is dropped
    async fn internal_scan_task(
        adapter: Adapter,
        devices: Arc<DeviceRegistry<Device>>,
        tx: mpsc::Sender<Result<DiscoveredDevice, TransportError>>,
    ) {
        let mut scan_stream = match adapter.scan(&[]).await {
            Ok(stream) => stream,
            Err(e) => {
                let _ = tx.send(Err(e.into())).await;
                return;
            }
        };

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(AdvertisingDevice { device, adv_data, rssi, .. }) => {
                            let described = describe(&device, adv_data.local_name, rssi);
                            devices.remember(&described.id, device).await;
                            if tx.send(Ok(described)).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            info!("Bluetooth scan stream has ended.");
                            break;
                        }
                    }
                }
                _ = tx.closed() => break,
            }
        }
        debug!("Scan task finished");
    }
}

#[async_trait]
impl BleTransport for BluestTransport {
    type Session = BluestSession;

    async fn scan(&self) -> Result<DeviceStream, TransportError> {
        let dropped = self.devices.reset().await;
        debug!("Forgot {} device(s) from the previous scan", dropped);

        // Peripherals that are already connected do not advertise, surface them first
        let mut already_connected = Vec::new();
        for device in self.adapter.connected_devices().await? {
            let described = describe(&device, None, None);
            self.devices.remember(&described.id, device).await;
            already_connected.push(Ok(described));
        }
        debug!("{} connected device(s) known to the adapter", already_connected.len());

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        tokio::spawn(Self::internal_scan_task(
            self.adapter.clone(),
            self.devices.clone(),
            tx,
        ));
        let live = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(stream::iter(already_connected).chain(live).boxed())
    }

    async fn connect(&self, device: &DiscoveredDevice) -> Result<Self::Session, TransportError> {
        let handle = self
            .devices
            .get(&device.id)
            .await
            .ok_or_else(|| TransportError::UnknownDevice(device.id.clone()))?;

        if !handle.is_connected().await {
            self.adapter.connect_device(&handle).await?;
        }
        Ok(BluestSession {
            adapter: self.adapter.clone(),
            device: handle,
            characteristics: Mutex::new(Vec::new()),
        })
    }
}

/// A connection opened by [`BluestTransport`]
pub struct BluestSession {
    adapter: Adapter,
    device: Device,
    /// Characteristics of the last topology snapshot, indexed by handle
    characteristics: Mutex<Vec<Characteristic>>,
}

impl BluestSession {
    async fn characteristic(
        &self,
        reference: &CharacteristicRef,
    ) -> Result<Characteristic, TransportError> {
        self.characteristics
            .lock()
            .await
            .get(reference.handle())
            .cloned()
            .ok_or(TransportError::UnknownCharacteristic(reference.handle()))
    }

    /// Forwards notifications to `tx`, reporting on `ready` once the subscription is active
    async fn process_notifications(
        characteristic: Characteristic,
        ready: oneshot::Sender<Result<(), TransportError>>,
        tx: mpsc::Sender<Result<NotificationFrame, TransportError>>,
    ) {
        let uuid = characteristic.uuid();
        let mut notification_stream = match characteristic.notify().await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to subscribe to notifications: {}", e);
                let _ = ready.send(Err(e.into()));
                return;
            }
        };
        if ready.send(Ok(())).is_err() {
            return;
        }

        loop {
            tokio::select! {
                result = notification_stream.next() => {
                    let item = match result {
                        Some(Ok(data)) => Ok(NotificationFrame { characteristic: uuid, data }),
                        Some(Err(e)) => Err(e.into()),
                        None => break,
                    };
                    let failed = item.is_err();
                    if tx.send(item).await.is_err() || failed {
                        break;
                    }
                }
                _ = tx.closed() => break,
            }
        }
        info!("Notification stream ended");
    }
}

#[async_trait]
impl BleSession for BluestSession {
    async fn services(&self) -> Result<Vec<GattService>, TransportError> {
        let mut snapshot = Vec::new();
        let mut services = Vec::new();
        for service in self.device.services().await? {
            let mut characteristics = Vec::new();
            for characteristic in service.characteristics().await? {
                let capabilities = capabilities_from_properties(&characteristic.properties().await?);
                debug!(
                    "Characteristic {} in {}: {:?}",
                    characteristic.uuid(),
                    service.uuid(),
                    capabilities
                );
                characteristics.push(CharacteristicRef::new(
                    snapshot.len(),
                    characteristic.uuid(),
                    service.uuid(),
                    capabilities,
                ));
                snapshot.push(characteristic);
            }
            services.push(GattService {
                uuid: service.uuid(),
                characteristics,
            });
        }
        *self.characteristics.lock().await = snapshot;
        Ok(services)
    }

    async fn write(
        &self,
        characteristic: &CharacteristicRef,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let handle = self.characteristic(characteristic).await?;
        handle.write(data).await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        characteristic: &CharacteristicRef,
    ) -> Result<NotificationStream, TransportError> {
        let handle = self.characteristic(characteristic).await?;
        let (ready_tx, ready_rx) = oneshot::channel();
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        tokio::spawn(Self::process_notifications(handle, ready_tx, tx));

        ready_rx.await.map_err(|_| TransportError::Disconnected)??;
        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.characteristics.lock().await.clear();
        if self.device.is_connected().await {
            self.adapter.disconnect_device(&self.device).await?;
        } else {
            info!("Device {} not connected", self.device.id());
        }
        Ok(())
    }
}
