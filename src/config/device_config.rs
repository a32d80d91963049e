use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bluetooth::constants::DEFAULT_DEVICE_NAME;
use crate::core::bluetooth::gatt::CharacteristicRoles;

/// Which peripheral to look for and how to use it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Case-insensitive substring of the advertised name
    pub device_name: String,

    /// Expected service. Only compared against what discovery picks.
    pub service_uuid: Option<Uuid>,

    /// Expected characteristic. Only compared against what discovery picks.
    pub characteristic_uuid: Option<Uuid>,

    /// Whether writes share the notify characteristic
    pub characteristic_roles: CharacteristicRoles,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            service_uuid: None,
            characteristic_uuid: None,
            characteristic_roles: CharacteristicRoles::default(),
        }
    }
}
