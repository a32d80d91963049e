//! Scripted in-memory transport for tests and dry runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use uuid::Uuid;

use crate::core::bluetooth::transport::{
    BleSession, BleTransport, DeviceStream, NotificationStream,
};
use crate::core::bluetooth::types::{
    Capabilities, Capability, CharacteristicRef, DiscoveredDevice, GattService, NotificationFrame,
};
use crate::error::TransportError;

/// Outcome of one scripted scan.
#[derive(Debug)]
pub enum ScanRound {
    Devices(Vec<DiscoveredDevice>),
    Fail(TransportError),
}

/// Something a session did, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Write { characteristic: Uuid, data: Vec<u8> },
    Subscribe { characteristic: Uuid },
    Disconnect,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Transport whose scans, topology and notifications are fixed up front.
/// Scans beyond the scripted rounds surface nothing.
#[derive(Debug, Default)]
pub struct MockTransport {
    scan_rounds: Mutex<VecDeque<ScanRound>>,
    scans: AtomicUsize,
    connects: AtomicUsize,
    connect_error: Option<String>,
    write_error: Option<String>,
    subscribe_error: Option<String>,
    stall_write: bool,
    stall_subscribe: bool,
    services: Vec<GattService>,
    frames: Vec<Vec<u8>>,
    hold_open: bool,
    events: Arc<Mutex<Vec<MockEvent>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scan_round(self, round: ScanRound) -> Self {
        lock(&self.scan_rounds).push_back(round);
        self
    }

    pub fn with_services(mut self, services: Vec<GattService>) -> Self {
        self.services = services;
        self
    }

    /// Frames delivered, in order, right after subscribing
    pub fn with_notifications(mut self, frames: Vec<Vec<u8>>) -> Self {
        self.frames = frames;
        self
    }

    /// Keep the notification stream open after the scripted frames instead of dropping the link
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn fail_connect(mut self, message: &str) -> Self {
        self.connect_error = Some(message.to_string());
        self
    }

    pub fn fail_write(mut self, message: &str) -> Self {
        self.write_error = Some(message.to_string());
        self
    }

    pub fn fail_subscribe(mut self, message: &str) -> Self {
        self.subscribe_error = Some(message.to_string());
        self
    }

    /// Writes never complete
    pub fn stall_write(mut self) -> Self {
        self.stall_write = true;
        self
    }

    /// Subscriptions are never confirmed
    pub fn stall_subscribe(mut self) -> Self {
        self.stall_subscribe = true;
        self
    }

    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<MockEvent> {
        lock(&self.events).clone()
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                MockEvent::Write { data, .. } => Some(data),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl BleTransport for MockTransport {
    type Session = MockSession;

    async fn scan(&self) -> Result<DeviceStream, TransportError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let round = lock(&self.scan_rounds).pop_front();
        match round {
            Some(ScanRound::Devices(devices)) => {
                Ok(stream::iter(devices.into_iter().map(Ok::<_, TransportError>)).boxed())
            }
            Some(ScanRound::Fail(e)) => Err(e),
            None => Ok(stream::empty().boxed()),
        }
    }

    async fn connect(&self, device: &DiscoveredDevice) -> Result<Self::Session, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.connect_error {
            return Err(TransportError::Other(format!("{}: {}", device.id, message)));
        }
        Ok(MockSession {
            services: self.services.clone(),
            frames: self.frames.clone(),
            hold_open: self.hold_open,
            write_error: self.write_error.clone(),
            subscribe_error: self.subscribe_error.clone(),
            stall_write: self.stall_write,
            stall_subscribe: self.stall_subscribe,
            events: self.events.clone(),
        })
    }
}

/// Connection handed out by [`MockTransport`].
#[derive(Debug)]
pub struct MockSession {
    services: Vec<GattService>,
    frames: Vec<Vec<u8>>,
    hold_open: bool,
    write_error: Option<String>,
    subscribe_error: Option<String>,
    stall_write: bool,
    stall_subscribe: bool,
    events: Arc<Mutex<Vec<MockEvent>>>,
}

impl MockSession {
    fn find(&self, characteristic: &CharacteristicRef) -> Result<&CharacteristicRef, TransportError> {
        self.services
            .iter()
            .flat_map(|s| s.characteristics.iter())
            .find(|c| c.handle() == characteristic.handle())
            .ok_or(TransportError::UnknownCharacteristic(characteristic.handle()))
    }
}

#[async_trait]
impl BleSession for MockSession {
    async fn services(&self) -> Result<Vec<GattService>, TransportError> {
        Ok(self.services.clone())
    }

    async fn write(
        &self,
        characteristic: &CharacteristicRef,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let characteristic = self.find(characteristic)?;
        if self.stall_write {
            std::future::pending::<()>().await;
        }
        if let Some(message) = &self.write_error {
            return Err(TransportError::Other(message.clone()));
        }
        lock(&self.events).push(MockEvent::Write {
            characteristic: characteristic.uuid,
            data: data.to_vec(),
        });
        Ok(())
    }

    async fn subscribe(
        &self,
        characteristic: &CharacteristicRef,
    ) -> Result<NotificationStream, TransportError> {
        let uuid = self.find(characteristic)?.uuid;
        if self.stall_subscribe {
            std::future::pending::<()>().await;
        }
        if let Some(message) = &self.subscribe_error {
            return Err(TransportError::Other(message.clone()));
        }
        lock(&self.events).push(MockEvent::Subscribe { characteristic: uuid });

        let frames = stream::iter(self.frames.clone().into_iter().map(move |data| {
            Ok::<_, TransportError>(NotificationFrame {
                characteristic: uuid,
                data,
            })
        }));
        if self.hold_open {
            Ok(frames.chain(stream::pending()).boxed())
        } else {
            Ok(frames.boxed())
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        lock(&self.events).push(MockEvent::Disconnect);
        Ok(())
    }
}

/// Builds a characteristic for a scripted topology.
pub fn characteristic(
    handle: usize,
    uuid: u128,
    service_uuid: u128,
    capabilities: &[Capability],
) -> CharacteristicRef {
    CharacteristicRef::new(
        handle,
        Uuid::from_u128(uuid),
        Uuid::from_u128(service_uuid),
        capabilities.iter().copied().collect::<Capabilities>(),
    )
}

/// Builds a service holding `characteristics`.
pub fn service(uuid: u128, characteristics: Vec<CharacteristicRef>) -> GattService {
    GattService {
        uuid: Uuid::from_u128(uuid),
        characteristics,
    }
}
