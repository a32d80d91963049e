//! Bluetooth functionality for the Tone bridge
//! This module handles discovery, connecting, the initial write and
//! receiving notifications from the Tone Equalizer.

pub mod bluest_transport;
pub mod connection;
pub mod constants;
pub mod device;
pub mod discovery;
pub mod gatt;
pub mod manager;
pub mod mock;
pub mod notification;
pub mod scanner;
pub mod transport;
pub mod types;

// Re-export types that should be publicly accessible
pub use bluest_transport::BluestTransport;
pub use connection::{Connection, ConnectionManager};
pub use device::DeviceMatcher;
pub use discovery::{discover_until_found, RetryPolicy};
pub use gatt::{find_characteristic, resolve_characteristics, CharacteristicRoles};
pub use manager::{SessionController, SessionSettings};
pub use notification::{Dispatch, ListenStopReason, NotificationHandler};
pub use scanner::{BluetoothScanner, DeviceClaim};
pub use transport::{BleSession, BleTransport, DeviceStream, NotificationStream};
pub use types::{
    Capabilities, Capability, CharacteristicRef, DiscoveredDevice, GattService, NotificationFrame,
    ResolvedCharacteristics, SessionState,
};
