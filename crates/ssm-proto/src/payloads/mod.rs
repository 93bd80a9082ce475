//! Typed message bodies.
//!
//! Inbound messages (peripheral to client) start with an [`OpCode`]; outbound
//! commands (client to peripheral) start directly with an [`ItemCode`]. The
//! same [`InboundMessage`] type is used by the simulated peripheral to produce
//! bytes, so encode and parse are kept side by side.
//!
//! # Invariants
//!
//! - Parsing never reads past the buffer: every layout is length-checked and
//!   short input yields [`ProtocolError::MessageTooShort`].
//! - Unknown item codes are preserved, not rejected.

pub mod command;
pub mod login;
pub mod mech_status;

use bytes::{BufMut, Bytes, BytesMut};

pub use self::{
    command::{Command, HistoryTag},
    login::{Initial, LoginAck, LoginRequest},
    mech_status::RawMechStatus,
};
use crate::{
    errors::{ProtocolError, Result},
    opcodes::{ItemCode, OpCode, ResultCode},
};

/// Reply to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Item the response refers to
    pub item: ItemCode,
    /// Outcome reported by the peripheral
    pub result: ResultCode,
    /// Item-specific data
    pub payload: Bytes,
}

/// A parsed inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// `0x07 | item | result | payload`
    Response(Response),
    /// `0x08 | item | payload`
    Publish {
        /// Item being published
        item: ItemCode,
        /// Item-specific data
        payload: Bytes,
    },
}

impl InboundMessage {
    /// Parse a reassembled (and decrypted) body.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MessageTooShort` if the body cannot hold the header
    ///   fields for its op code
    /// - `ProtocolError::UnknownOpCode` if the first byte is not a known op
    pub fn parse(body: &Bytes) -> Result<Self> {
        let Some(&op) = body.first() else {
            return Err(ProtocolError::MessageTooShort { expected: 2, actual: 0 });
        };

        match OpCode::from_u8(op) {
            Some(OpCode::Response) => {
                if body.len() < 3 {
                    return Err(ProtocolError::MessageTooShort { expected: 3, actual: body.len() });
                }
                Ok(Self::Response(Response {
                    item: ItemCode::from_u8(body[1]),
                    result: ResultCode(body[2]),
                    payload: body.slice(3..),
                }))
            },
            Some(OpCode::Publish) => {
                if body.len() < 2 {
                    return Err(ProtocolError::MessageTooShort { expected: 2, actual: body.len() });
                }
                Ok(Self::Publish { item: ItemCode::from_u8(body[1]), payload: body.slice(2..) })
            },
            None => Err(ProtocolError::UnknownOpCode(op)),
        }
    }

    /// Serialize to wire layout.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        match self {
            Self::Response(response) => {
                let mut buf = BytesMut::with_capacity(3 + response.payload.len());
                buf.put_u8(OpCode::Response.to_u8());
                buf.put_u8(response.item.to_u8());
                buf.put_u8(response.result.0);
                buf.put_slice(&response.payload);
                buf.freeze()
            },
            Self::Publish { item, payload } => {
                let mut buf = BytesMut::with_capacity(2 + payload.len());
                buf.put_u8(OpCode::Publish.to_u8());
                buf.put_u8(item.to_u8());
                buf.put_slice(payload);
                buf.freeze()
            },
        }
    }

    /// Item code of the message.
    pub fn item(&self) -> ItemCode {
        match self {
            Self::Response(response) => response.item,
            Self::Publish { item, .. } => *item,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_publish() {
        let body = Bytes::from_static(&[0x08, 14, 0xde, 0xad, 0xbe, 0xef]);
        let message = InboundMessage::parse(&body).unwrap();

        assert_eq!(message, InboundMessage::Publish {
            item: ItemCode::Initial,
            payload: Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
        });
    }

    #[test]
    fn parses_response_with_result() {
        let body = Bytes::from_static(&[0x07, 82, 0x05]);
        let InboundMessage::Response(response) = InboundMessage::parse(&body).unwrap() else {
            panic!("expected response");
        };

        assert_eq!(response.item, ItemCode::Lock);
        assert_eq!(response.result, ResultCode(5));
        assert!(!response.result.is_success());
        assert!(response.payload.is_empty());
    }

    #[test]
    fn rejects_truncated_response() {
        let body = Bytes::from_static(&[0x07, 2]);
        assert_eq!(
            InboundMessage::parse(&body).unwrap_err(),
            ProtocolError::MessageTooShort { expected: 3, actual: 2 }
        );
    }

    #[test]
    fn rejects_empty_and_unknown() {
        assert!(matches!(
            InboundMessage::parse(&Bytes::new()),
            Err(ProtocolError::MessageTooShort { .. })
        ));
        assert_eq!(
            InboundMessage::parse(&Bytes::from_static(&[0x01, 2])).unwrap_err(),
            ProtocolError::UnknownOpCode(0x01)
        );
    }

    #[test]
    fn encode_matches_parse() {
        let message = InboundMessage::Response(Response {
            item: ItemCode::Login,
            result: ResultCode::SUCCESS,
            payload: Bytes::from_static(&[1, 2, 3, 4]),
        });
        let bytes = message.encode();

        assert_eq!(bytes.as_ref(), &[0x07, 2, 0, 1, 2, 3, 4]);
        assert_eq!(InboundMessage::parse(&bytes).unwrap(), message);
    }
}
