//! Bluetooth connection handling for the Tone Equalizer
//! This module handles connecting to the device, resolving characteristics,
//! the initial write, subscribing and disconnecting

use std::future::Future;
use std::time::Duration;

use log::{info, warn};
use uuid::Uuid;

use crate::core::bluetooth::gatt::{resolve_characteristics, CharacteristicRoles};
use crate::core::bluetooth::transport::{BleSession, BleTransport, NotificationStream};
use crate::core::bluetooth::types::{DiscoveredDevice, ResolvedCharacteristics};
use crate::core::payload::encode_volume_frame;
use crate::error::{SessionError, TransportError};

/// Runs `operation`, failing with [`TransportError::Timeout`] after `limit`.
pub async fn with_timeout<T, F>(
    operation: &'static str,
    limit: Duration,
    future: F,
) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| TransportError::Timeout {
            operation,
            secs: limit.as_secs(),
        })?
}

/// Connection manager for the device
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    operation_timeout: Duration,
    roles: CharacteristicRoles,
}

impl ConnectionManager {
    pub fn new(operation_timeout: Duration, roles: CharacteristicRoles) -> Self {
        Self {
            operation_timeout,
            roles,
        }
    }

    /// Opens the physical link. No retry: a failure ends this attempt.
    pub async fn connect<T>(
        &self,
        transport: &T,
        device: DiscoveredDevice,
    ) -> Result<Connection<T::Session>, SessionError>
    where
        T: BleTransport + ?Sized,
    {
        info!(
            "Initiating connection to {} ({})...",
            device.display_name(),
            device.address
        );
        let session = with_timeout("connect", self.operation_timeout, transport.connect(&device))
            .await
            .map_err(SessionError::Connection)?;
        info!("Connected to {} ({})", device.display_name(), device.address);
        Ok(Connection {
            device,
            session,
            operation_timeout: self.operation_timeout,
            roles: self.roles,
        })
    }
}

/// One live link, exclusively owned by the session that opened it
pub struct Connection<S: BleSession> {
    device: DiscoveredDevice,
    session: S,
    operation_timeout: Duration,
    roles: CharacteristicRoles,
}

impl<S: BleSession> Connection<S> {
    pub fn device(&self) -> &DiscoveredDevice {
        &self.device
    }

    /// Discovers services and picks the characteristics for this connection.
    pub async fn resolve_characteristics(&self) -> Result<ResolvedCharacteristics, SessionError> {
        info!("Discovering services...");
        let services = with_timeout(
            "service discovery",
            self.operation_timeout,
            self.session.services(),
        )
        .await
        .map_err(SessionError::Connection)?;
        for service in &services {
            info!(
                "Service {} with {} characteristic(s)",
                service.uuid,
                service.characteristics.len()
            );
        }

        let resolved = resolve_characteristics(&services, self.roles)?;
        info!(
            "Using characteristic {} for writes and {} for notifications",
            resolved.write.uuid, resolved.notify.uuid
        );
        Ok(resolved)
    }

    /// Writes `vol:<volume>` and waits for the acknowledgement, bounded by the operation timeout.
    pub async fn write_initial_volume(
        &self,
        characteristics: &ResolvedCharacteristics,
        volume: i64,
    ) -> Result<(), SessionError> {
        let frame = encode_volume_frame(volume);
        info!("Sending initial state: {}", String::from_utf8_lossy(&frame));
        with_timeout(
            "write",
            self.operation_timeout,
            self.session.write(&characteristics.write, &frame),
        )
        .await
        .map_err(SessionError::InitialWrite)
    }

    pub async fn subscribe(
        &self,
        characteristics: &ResolvedCharacteristics,
    ) -> Result<NotificationStream, SessionError> {
        info!("Subscribing to notifications...");
        with_timeout(
            "subscribe",
            self.operation_timeout,
            self.session.subscribe(&characteristics.notify),
        )
        .await
        .map_err(SessionError::Subscribe)
    }

    /// Disconnect from the device
    pub async fn close(self) {
        info!("Disconnecting from device {}", self.device.id);
        match self.session.disconnect().await {
            Ok(()) => info!("Successfully disconnected"),
            Err(e) => warn!("Disconnect from {} failed: {}", self.device.id, e),
        }
    }
}

/// Logs a warning when a configured UUID disagrees with what capability discovery picked.
pub fn warn_on_uuid_mismatch(
    resolved: &ResolvedCharacteristics,
    service_uuid: Option<Uuid>,
    characteristic_uuid: Option<Uuid>,
) -> bool {
    let mut mismatch = false;
    if let Some(expected) = characteristic_uuid {
        if resolved.notify.uuid != expected {
            warn!(
                "Configured characteristic {} differs from discovered {}",
                expected, resolved.notify.uuid
            );
            mismatch = true;
        }
    }
    if let Some(expected) = service_uuid {
        if resolved.notify.service_uuid != expected {
            warn!(
                "Configured service {} differs from discovered {}",
                expected, resolved.notify.service_uuid
            );
            mismatch = true;
        }
    }
    mismatch
}
