//! Bitfields carried on the wire.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Segment header byte prefixed to every transport chunk.
    ///
    /// A message is complete once a segment carries either terminator bit.
    /// The terminator used tells the receiver whether the reassembled bytes
    /// are ciphertext.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SegmentFlags: u8 {
        /// First segment of a message
        const START = 0b0000_0001;
        /// Last segment of a plaintext message
        const END_PLAINTEXT = 0b0000_0010;
        /// Last segment of an encrypted message
        const END_ENCRYPTED = 0b0000_0100;
    }
}

impl SegmentFlags {
    /// Parse a header byte. Unknown bits are ignored.
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        Self::from_bits_truncate(byte)
    }

    /// Header byte for a segment at the given position.
    #[must_use]
    pub fn for_segment(is_first: bool, is_last: bool, encrypted: bool) -> Self {
        let mut flags = Self::empty();
        if is_first {
            flags |= Self::START;
        }
        if is_last {
            flags |= if encrypted { Self::END_ENCRYPTED } else { Self::END_PLAINTEXT };
        }
        flags
    }

    /// True for the first segment of a message.
    #[must_use]
    pub fn is_start(self) -> bool {
        self.contains(Self::START)
    }

    /// True when this segment terminates a message.
    #[must_use]
    pub fn is_end(self) -> bool {
        self.intersects(Self::END_PLAINTEXT | Self::END_ENCRYPTED)
    }

    /// True when the terminated message is ciphertext.
    #[must_use]
    pub fn is_encrypted(self) -> bool {
        self.contains(Self::END_ENCRYPTED)
    }
}

bitflags! {
    /// Flag byte of the mechanical status record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MechStatusFlags: u8 {
        /// Clutch failed to engage
        const CLUTCH_FAILED = 1 << 0;
        /// Thumb-turn is inside the configured lock range
        const LOCK_RANGE = 1 << 1;
        /// Thumb-turn is inside the configured unlock range
        const UNLOCK_RANGE = 1 << 2;
        /// Mechanism reports a critical condition (jam, over-current)
        const CRITICAL = 1 << 3;
        /// Motor is stopped
        const STOP = 1 << 4;
        /// Battery is below the low threshold
        const LOW_BATTERY = 1 << 5;
        /// Locking direction is clockwise
        const CLOCKWISE = 1 << 6;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_segment_plaintext_header() {
        let flags = SegmentFlags::for_segment(true, true, false);
        assert_eq!(flags.bits(), 0b011);
        assert!(flags.is_start());
        assert!(flags.is_end());
        assert!(!flags.is_encrypted());
    }

    #[test]
    fn last_encrypted_segment_header() {
        let flags = SegmentFlags::for_segment(false, true, true);
        assert_eq!(flags.bits(), 0b100);
        assert!(!flags.is_start());
        assert!(flags.is_encrypted());
    }

    #[test]
    fn middle_segment_has_no_bits() {
        assert_eq!(SegmentFlags::for_segment(false, false, true).bits(), 0);
    }

    #[test]
    fn unknown_header_bits_are_ignored() {
        let flags = SegmentFlags::from_byte(0b1111_0001);
        assert_eq!(flags, SegmentFlags::START);
    }
}
