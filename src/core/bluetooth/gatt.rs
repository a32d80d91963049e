//! Characteristic selection by capability.
//! UUIDs are never consulted: the first characteristic that can do the job wins.

use serde::{Deserialize, Serialize};

use crate::core::bluetooth::types::{
    Capability, CharacteristicRef, GattService, ResolvedCharacteristics,
};
use crate::error::SetupError;

/// How the write and notify roles map onto characteristics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacteristicRoles {
    /// The first notify-capable characteristic serves both roles
    #[default]
    Shared,
    /// Writes go to the first write-capable characteristic, notifications come from
    /// the first notify-capable one
    Split,
}

/// Returns the first characteristic, services first and then characteristics in
/// enumeration order, whose capabilities include `capability`.
pub fn find_characteristic(
    services: &[GattService],
    capability: Capability,
) -> Option<&CharacteristicRef> {
    services
        .iter()
        .flat_map(|service| service.characteristics.iter())
        .find(|characteristic| characteristic.capabilities.contains(capability))
}

fn require(
    services: &[GattService],
    capability: Capability,
) -> Result<CharacteristicRef, SetupError> {
    find_characteristic(services, capability)
        .cloned()
        .ok_or(SetupError::MissingCharacteristic { capability })
}

/// Resolves the characteristics a session needs from a fresh topology snapshot.
pub fn resolve_characteristics(
    services: &[GattService],
    roles: CharacteristicRoles,
) -> Result<ResolvedCharacteristics, SetupError> {
    let notify = require(services, Capability::Notify)?;
    let write = match roles {
        CharacteristicRoles::Shared => notify.clone(),
        CharacteristicRoles::Split => require(services, Capability::Write).or_else(|e| {
            find_characteristic(services, Capability::WriteWithoutResponse)
                .cloned()
                .ok_or(e)
        })?,
    };
    Ok(ResolvedCharacteristics { write, notify })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::mock::{characteristic, service};
    use Capability::*;

    fn topology() -> Vec<GattService> {
        vec![
            service(0x1800, vec![characteristic(0, 0x2a00, 0x1800, &[Read])]),
            service(
                0xff00,
                vec![
                    characteristic(1, 0xff01, 0xff00, &[Read, Write]),
                    characteristic(2, 0xff02, 0xff00, &[Notify]),
                    characteristic(3, 0xff03, 0xff00, &[Write, Notify]),
                ],
            ),
            service(0xee00, vec![characteristic(4, 0xee01, 0xee00, &[Indicate, Notify])]),
        ]
    }

    #[test]
    fn finds_first_in_traversal_order() {
        let services = topology();
        assert_eq!(find_characteristic(&services, Read).map(|c| c.handle()), Some(0));
        assert_eq!(find_characteristic(&services, Write).map(|c| c.handle()), Some(1));
        assert_eq!(find_characteristic(&services, Notify).map(|c| c.handle()), Some(2));
        assert_eq!(find_characteristic(&services, Indicate).map(|c| c.handle()), Some(4));
    }

    #[test]
    fn returns_none_when_nothing_qualifies() {
        let services = topology();
        assert!(find_characteristic(&services, WriteWithoutResponse).is_none());
        assert!(find_characteristic(&[], Notify).is_none());
        assert!(find_characteristic(&[service(0x1800, vec![])], Notify).is_none());
    }

    #[test]
    fn shared_roles_reuse_the_notify_characteristic() {
        let resolved = resolve_characteristics(&topology(), CharacteristicRoles::Shared).unwrap();
        assert_eq!(resolved.notify.handle(), 2);
        assert_eq!(resolved.write.handle(), 2);
    }

    #[test]
    fn split_roles_pick_distinct_characteristics() {
        let resolved = resolve_characteristics(&topology(), CharacteristicRoles::Split).unwrap();
        assert_eq!(resolved.notify.handle(), 2);
        assert_eq!(resolved.write.handle(), 1);
    }

    #[test]
    fn split_roles_fall_back_to_write_without_response() {
        let services = vec![service(
            0xff00,
            vec![
                characteristic(0, 0xff01, 0xff00, &[Notify]),
                characteristic(1, 0xff02, 0xff00, &[WriteWithoutResponse]),
            ],
        )];
        let resolved = resolve_characteristics(&services, CharacteristicRoles::Split).unwrap();
        assert_eq!(resolved.write.handle(), 1);
    }

    #[test]
    fn missing_capability_is_a_setup_error() {
        let services = vec![service(0xff00, vec![characteristic(0, 0xff01, 0xff00, &[Write])])];
        assert_eq!(
            resolve_characteristics(&services, CharacteristicRoles::Shared),
            Err(SetupError::MissingCharacteristic { capability: Notify })
        );

        let services = vec![service(0xff00, vec![characteristic(0, 0xff01, 0xff00, &[Notify])])];
        assert_eq!(
            resolve_characteristics(&services, CharacteristicRoles::Split),
            Err(SetupError::MissingCharacteristic { capability: Write })
        );
    }
}
