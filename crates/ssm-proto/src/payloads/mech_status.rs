//! Mechanical status record.
//!
//! Published by the peripheral under [`ItemCode::MechStatus`] whenever the
//! thumb-turn moves or the battery reading changes. Layout (little-endian):
//!
//! ```text
//! battery: u16 | target: i16 | position: i16 | flags: u8
//! ```
//!
//! [`ItemCode::MechStatus`]: crate::ItemCode::MechStatus

use serde::{Deserialize, Serialize};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{
    errors::{ProtocolError, Result},
    flags::MechStatusFlags,
};

/// Wire size of the record.
pub const MECH_STATUS_LEN: usize = 7;

#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
struct MechStatusWire {
    battery: [u8; 2],
    target: [u8; 2],
    position: [u8; 2],
    flags: u8,
}

const _: () = assert!(size_of::<MechStatusWire>() == MECH_STATUS_LEN);

/// Decoded mechanical status, exactly as reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RawMechStatus {
    /// Raw battery reading (half-millivolts)
    pub battery: u16,
    /// Motor target angle
    pub target: i16,
    /// Current thumb-turn angle
    pub position: i16,
    /// Clutch failed to engage
    pub is_clutch_failed: bool,
    /// Inside the lock range
    pub is_lock_range: bool,
    /// Inside the unlock range
    pub is_unlock_range: bool,
    /// Critical condition reported
    pub is_critical: bool,
    /// Motor stopped
    pub is_stop: bool,
    /// Battery low
    pub is_low_battery: bool,
    /// Locking direction is clockwise
    pub is_clockwise: bool,
}

impl RawMechStatus {
    /// Parse the publish payload. Bytes past the record are ignored.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MessageTooShort` if fewer than 7 bytes are present
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let (wire, _) = MechStatusWire::ref_from_prefix(payload).map_err(|_| {
            ProtocolError::MessageTooShort { expected: MECH_STATUS_LEN, actual: payload.len() }
        })?;
        let flags = MechStatusFlags::from_bits_truncate(wire.flags);

        Ok(Self {
            battery: u16::from_le_bytes(wire.battery),
            target: i16::from_le_bytes(wire.target),
            position: i16::from_le_bytes(wire.position),
            is_clutch_failed: flags.contains(MechStatusFlags::CLUTCH_FAILED),
            is_lock_range: flags.contains(MechStatusFlags::LOCK_RANGE),
            is_unlock_range: flags.contains(MechStatusFlags::UNLOCK_RANGE),
            is_critical: flags.contains(MechStatusFlags::CRITICAL),
            is_stop: flags.contains(MechStatusFlags::STOP),
            is_low_battery: flags.contains(MechStatusFlags::LOW_BATTERY),
            is_clockwise: flags.contains(MechStatusFlags::CLOCKWISE),
        })
    }

    /// Flag byte for this record.
    pub fn flags(&self) -> MechStatusFlags {
        let mut flags = MechStatusFlags::empty();
        flags.set(MechStatusFlags::CLUTCH_FAILED, self.is_clutch_failed);
        flags.set(MechStatusFlags::LOCK_RANGE, self.is_lock_range);
        flags.set(MechStatusFlags::UNLOCK_RANGE, self.is_unlock_range);
        flags.set(MechStatusFlags::CRITICAL, self.is_critical);
        flags.set(MechStatusFlags::STOP, self.is_stop);
        flags.set(MechStatusFlags::LOW_BATTERY, self.is_low_battery);
        flags.set(MechStatusFlags::CLOCKWISE, self.is_clockwise);
        flags
    }

    /// Serialize to wire layout.
    #[must_use]
    pub fn encode(&self) -> [u8; MECH_STATUS_LEN] {
        let wire = MechStatusWire {
            battery: self.battery.to_le_bytes(),
            target: self.target.to_le_bytes(),
            position: self.position.to_le_bytes(),
            flags: self.flags().bits(),
        };
        let mut out = [0u8; MECH_STATUS_LEN];
        out.copy_from_slice(wire.as_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn decodes_locked_record() {
        // battery 2978, target -32768, position -17, lock range
        let raw = RawMechStatus::decode(&hex!("a20b 0080 efff 02")).unwrap();

        assert_eq!(raw, RawMechStatus {
            battery: 2978,
            target: -32768,
            position: -17,
            is_lock_range: true,
            ..RawMechStatus::default()
        });
    }

    #[test]
    fn decodes_every_flag_bit() {
        let raw = RawMechStatus::decode(&hex!("0000 0000 0000 7f")).unwrap();

        assert!(raw.is_clutch_failed);
        assert!(raw.is_lock_range);
        assert!(raw.is_unlock_range);
        assert!(raw.is_critical);
        assert!(raw.is_stop);
        assert!(raw.is_low_battery);
        assert!(raw.is_clockwise);
        assert_eq!(raw.flags().bits(), 0x7f);
    }

    #[test]
    fn ignores_trailing_bytes() {
        let raw = RawMechStatus::decode(&hex!("a20b 0080 efff 02 ffff")).unwrap();
        assert_eq!(raw.battery, 2978);
    }

    #[test]
    fn rejects_short_payload() {
        assert_eq!(
            RawMechStatus::decode(&hex!("a20b 0080 efff")).unwrap_err(),
            ProtocolError::MessageTooShort { expected: 7, actual: 6 }
        );
    }

    #[test]
    fn encode_matches_wire() {
        let raw = RawMechStatus {
            battery: 2978,
            target: -32768,
            position: -17,
            is_lock_range: true,
            is_clockwise: true,
            ..RawMechStatus::default()
        };
        assert_eq!(raw.encode(), hex!("a20b 0080 efff 42"));
    }
}
