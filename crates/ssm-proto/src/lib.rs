//! Wire format for the SESAME OS3 BLE protocol.
//!
//! The peripheral speaks over two GATT characteristics (write and notify),
//! each limited to a small write size. Logical messages are split into
//! segments, each prefixed with a one-byte [`SegmentFlags`] header that marks
//! the first segment and whether the last segment closes a plaintext or an
//! encrypted message. [`FrameCodec`] handles both directions.
//!
//! Once reassembled (and decrypted by the session layer when needed), an
//! inbound message is `op_code | item_code | ...` and is parsed into an
//! [`InboundMessage`]. Outbound commands carry no op code: they are
//! `item_code | payload`.
//!
//! # Security
//!
//! This crate provides structural validity only. It never decides whether a
//! message is authentic; the session layer must authenticate encrypted
//! messages before any payload here is trusted. Reassembly is bounded so a
//! peer that never terminates a message cannot grow memory without limit.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod errors;
pub mod flags;
pub mod opcodes;
pub mod payloads;

pub use codec::{DEFAULT_MAX_MESSAGE_LEN, DEFAULT_WRITE_LEN, FrameCodec, Message};
pub use errors::{ProtocolError, Result};
pub use flags::{MechStatusFlags, SegmentFlags};
pub use opcodes::{ItemCode, OpCode, ResultCode};
pub use payloads::{
    Command, HistoryTag, InboundMessage, Initial, LoginAck, LoginRequest, RawMechStatus, Response,
    mech_status::MECH_STATUS_LEN,
};
