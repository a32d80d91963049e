use serde::{Deserialize, Serialize};

use crate::core::bluetooth::constants::DEFAULT_FALLBACK_VOLUME;

/// Host volume behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Apply volume changes reported by the device. Hosts without a volume backend only log them.
    pub dispatch: bool,

    /// Volume sent to the device when the host level cannot be read
    pub fallback_volume: u8,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        VolumeConfig {
            dispatch: true,
            fallback_volume: DEFAULT_FALLBACK_VOLUME,
        }
    }
}
