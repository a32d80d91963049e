//! Defines shared data structures for the Bluetooth module.

use std::fmt;

use uuid::Uuid;

/// Represents a discovered Bluetooth device
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DiscoveredDevice {
    /// The advertised name of the device, if available
    pub name: Option<String>,
    /// The address of the device (MAC address on most platforms, "N/A" when the platform hides it)
    pub address: String,
    /// Platform-specific unique identifier, used by the transport to find its own device handle
    pub id: String,
    /// The signal strength (RSSI) of the device
    pub rssi: Option<i16>,
}

impl DiscoveredDevice {
    /// Creates a new DiscoveredDevice instance
    pub fn new(name: Option<String>, address: String, id: String, rssi: Option<i16>) -> Self {
        Self {
            name,
            address,
            id,
            rssi,
        }
    }

    /// Name for log lines
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }
}

/// A single GATT characteristic capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Read,
    Write,
    WriteWithoutResponse,
    Notify,
    Indicate,
}

impl Capability {
    fn bit(self) -> u8 {
        match self {
            Self::Read => 1 << 0,
            Self::Write => 1 << 1,
            Self::WriteWithoutResponse => 1 << 2,
            Self::Notify => 1 << 3,
            Self::Indicate => 1 << 4,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::WriteWithoutResponse => "write-without-response",
            Self::Notify => "notify",
            Self::Indicate => "indicate",
        };
        f.write_str(name)
    }
}

/// Set of capabilities advertised by a characteristic
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.0 |= capability.bit();
        self
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const ALL: [Capability; 5] = [
            Capability::Read,
            Capability::Write,
            Capability::WriteWithoutResponse,
            Capability::Notify,
            Capability::Indicate,
        ];
        f.debug_set()
            .entries(ALL.iter().filter(|c| self.contains(**c)))
            .finish()
    }
}

/// A characteristic in the topology snapshot of one connection.
/// The handle is only meaningful to the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicRef {
    handle: usize,
    pub uuid: Uuid,
    pub service_uuid: Uuid,
    pub capabilities: Capabilities,
}

impl CharacteristicRef {
    pub fn new(handle: usize, uuid: Uuid, service_uuid: Uuid, capabilities: Capabilities) -> Self {
        Self {
            handle,
            uuid,
            service_uuid,
            capabilities,
        }
    }

    pub fn handle(&self) -> usize {
        self.handle
    }
}

/// A service and its characteristics, in the order the transport enumerated them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub characteristics: Vec<CharacteristicRef>,
}

/// Raw bytes pushed by the peer, tagged with the characteristic they came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationFrame {
    pub characteristic: Uuid,
    pub data: Vec<u8>,
}

/// Characteristics resolved for one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCharacteristics {
    /// Target of the initial volume write
    pub write: CharacteristicRef,
    /// Source of notifications
    pub notify: CharacteristicRef,
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Claimed,
    Connecting,
    Connected,
    WriteComplete,
    Subscribed,
    Closed,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_contain_only_what_was_added() {
        let caps: Capabilities = [Capability::Write, Capability::Notify].into_iter().collect();
        assert!(caps.contains(Capability::Write));
        assert!(caps.contains(Capability::Notify));
        assert!(!caps.contains(Capability::Read));
        assert!(!caps.contains(Capability::Indicate));
        assert!(Capabilities::empty().is_empty());
        assert_eq!(format!("{:?}", caps), "{Write, Notify}");
    }

    #[test]
    fn unnamed_device_displays_unknown() {
        let device = DiscoveredDevice::new(None, "N/A".into(), "id".into(), None);
        assert_eq!(device.display_name(), "Unknown");
    }
}
