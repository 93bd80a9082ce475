//! Handshake messages.
//!
//! Right after notifications are enabled the peripheral publishes
//! [`Initial`] with a fresh random code. The client answers with a plaintext
//! [`LoginRequest`] carrying the first bytes of a token derived from that
//! code, and the peripheral replies with an encrypted login response whose
//! payload is [`LoginAck`].

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    errors::{ProtocolError, Result},
    opcodes::ItemCode,
};

/// Peripheral's per-connection random code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Initial {
    /// Random code mixed into the session key and every nonce
    pub random_code: [u8; 4],
}

impl Initial {
    /// Wire size of the payload.
    pub const SIZE: usize = 4;

    /// Parse the INITIAL publish payload. Trailing bytes are ignored.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MessageTooShort` if fewer than 4 bytes are present
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let Some(code) = payload.first_chunk::<{ Self::SIZE }>() else {
            return Err(ProtocolError::MessageTooShort {
                expected: Self::SIZE,
                actual: payload.len(),
            });
        };
        Ok(Self { random_code: *code })
    }
}

/// Proof of key possession: `LOGIN | token[0..4]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginRequest {
    /// Leading bytes of the session token
    pub token_prefix: [u8; 4],
}

impl LoginRequest {
    /// Serialize to wire layout.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + self.token_prefix.len());
        buf.put_u8(ItemCode::Login.to_u8());
        buf.put_slice(&self.token_prefix);
        buf.freeze()
    }

    /// Parse a login request as the peripheral sees it.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnexpectedItem` if the item is not LOGIN
    /// - `ProtocolError::MessageTooShort` if the token prefix is truncated
    pub fn decode(body: &[u8]) -> Result<Self> {
        let Some((&item, rest)) = body.split_first() else {
            return Err(ProtocolError::MessageTooShort { expected: 5, actual: 0 });
        };
        if ItemCode::from_u8(item) != ItemCode::Login {
            return Err(ProtocolError::UnexpectedItem(item));
        }
        let Some(prefix) = rest.first_chunk::<4>() else {
            return Err(ProtocolError::MessageTooShort { expected: 5, actual: body.len() });
        };
        Ok(Self { token_prefix: *prefix })
    }
}

/// Payload of a successful login response: the peripheral's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginAck {
    /// Peripheral time in unix seconds
    pub timestamp: u32,
}

impl LoginAck {
    /// Parse the login response payload (u32, little-endian).
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MessageTooShort` if fewer than 4 bytes are present
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let Some(raw) = payload.first_chunk::<4>() else {
            return Err(ProtocolError::MessageTooShort { expected: 4, actual: payload.len() });
        };
        Ok(Self { timestamp: u32::from_le_bytes(*raw) })
    }

    /// Serialize the payload.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        Bytes::copy_from_slice(&self.timestamp.to_le_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_request_layout() {
        let request = LoginRequest { token_prefix: [0xaa, 0xbb, 0xcc, 0xdd] };
        let bytes = request.encode();

        assert_eq!(bytes.as_ref(), &[2, 0xaa, 0xbb, 0xcc, 0xdd]);
        assert_eq!(LoginRequest::decode(&bytes).unwrap(), request);
    }

    #[test]
    fn login_request_rejects_other_items() {
        assert_eq!(
            LoginRequest::decode(&[82, 1, 2, 3, 4]).unwrap_err(),
            ProtocolError::UnexpectedItem(82)
        );
    }

    #[test]
    fn initial_takes_first_four_bytes() {
        let initial = Initial::decode(&[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(initial.random_code, [1, 2, 3, 4]);
        assert!(Initial::decode(&[1, 2, 3]).is_err());
    }

    #[test]
    fn login_ack_is_little_endian() {
        let ack = LoginAck::decode(&[0x78, 0x56, 0x34, 0x12]).unwrap();
        assert_eq!(ack.timestamp, 0x1234_5678);
        assert_eq!(ack.encode().as_ref(), &[0x78, 0x56, 0x34, 0x12]);
    }
}
