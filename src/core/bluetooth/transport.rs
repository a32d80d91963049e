//! Capabilities the session needs from a Bluetooth stack.
//! The real implementation lives in `bluest_transport`, the scripted one in `mock`.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::core::bluetooth::types::{
    CharacteristicRef, DiscoveredDevice, GattService, NotificationFrame,
};
use crate::error::TransportError;

/// Devices surfaced by a scan, in arrival order. Never ends on its own for a live radio.
pub type DeviceStream =
    Pin<Box<dyn Stream<Item = Result<DiscoveredDevice, TransportError>> + Send>>;

/// Frames pushed by the peer. Ends when the link goes away.
pub type NotificationStream =
    Pin<Box<dyn Stream<Item = Result<NotificationFrame, TransportError>> + Send>>;

/// Discovery and connection.
#[async_trait]
pub trait BleTransport: Send + Sync {
    type Session: BleSession;

    /// Starts a scan. The caller bounds it in time by dropping the stream.
    async fn scan(&self) -> Result<DeviceStream, TransportError>;

    /// Opens a connection to a device previously surfaced by `scan`.
    async fn connect(&self, device: &DiscoveredDevice) -> Result<Self::Session, TransportError>;
}

/// One live connection.
#[async_trait]
pub trait BleSession: Send + Sync {
    /// Service/characteristic topology, in the order the peer enumerates it.
    async fn services(&self) -> Result<Vec<GattService>, TransportError>;

    /// Writes `data` and waits for the peer to acknowledge it.
    async fn write(&self, characteristic: &CharacteristicRef, data: &[u8])
    -> Result<(), TransportError>;

    /// Subscribes to notifications. Returns once the subscription is active.
    async fn subscribe(
        &self,
        characteristic: &CharacteristicRef,
    ) -> Result<NotificationStream, TransportError>;

    /// Tears the link down.
    async fn disconnect(&self) -> Result<(), TransportError>;
}
