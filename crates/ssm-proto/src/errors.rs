//! Error types for wire-format handling.
//!
//! Every variant here is a frame-level problem: the current inbound message is
//! dropped and the session otherwise continues.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while segmenting, reassembling, or parsing messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A notification arrived with no header byte.
    #[error("empty segment")]
    EmptySegment,

    /// A continuation segment arrived while no message was being reassembled.
    #[error("orphan segment: continuation without a start segment")]
    OrphanSegment,

    /// Reassembly would exceed the configured bound.
    #[error("frame too large: {size} bytes exceeds maximum {max}")]
    FrameTooLarge {
        /// Size the buffer would have reached
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// Outbound message exceeds the configured bound.
    #[error("payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge {
        /// Payload size
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// Write size cannot carry a header byte plus at least one body byte.
    #[error("invalid write size {0}: need at least 2 bytes per segment")]
    InvalidWriteSize(usize),

    /// Message shorter than its layout requires.
    #[error("message too short: expected at least {expected} bytes, got {actual}")]
    MessageTooShort {
        /// Minimum bytes required
        expected: usize,
        /// Bytes received
        actual: usize,
    },

    /// Op code outside the response/publish set.
    #[error("unknown op code {0:#04x}")]
    UnknownOpCode(u8),

    /// Item code not valid in this position.
    #[error("unexpected item code {0}")]
    UnexpectedItem(u8),
}
