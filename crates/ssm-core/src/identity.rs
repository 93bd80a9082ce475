//! Device identity and registration secret.

use std::fmt;

use thiserror::Error;
use zeroize::Zeroize;

/// Errors parsing a secret key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Not 32 hex characters
    #[error("secret key must be 32 hex characters, got {0}")]
    InvalidLength(usize),

    /// Contains a non-hex character
    #[error("secret key is not valid hex")]
    InvalidHex,
}

/// 16-byte registration secret extracted from the vendor app.
///
/// Only used locally to derive session tokens. Zeroized on drop; `Debug`
/// never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey([u8; 16]);

impl SecretKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Parse a 32-character hex string. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// - `KeyError::InvalidLength` if the trimmed input is not 32 characters
    /// - `KeyError::InvalidHex` if any character is not a hex digit
    pub fn from_hex(input: &str) -> Result<Self, KeyError> {
        let input = input.trim();
        if input.len() != 32 {
            return Err(KeyError::InvalidLength(input.len()));
        }

        let mut bytes = [0u8; 16];
        if hex::decode_to_slice(input, &mut bytes).is_err() {
            bytes.zeroize();
            return Err(KeyError::InvalidHex);
        }
        Ok(Self(bytes))
    }

    /// Key bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Which lock to talk to and how to authenticate to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Transport address, e.g. a BLE MAC `AA:BB:CC:DD:EE:FF`
    pub address: String,
    /// Registration secret
    pub secret: SecretKey,
}

impl DeviceIdentity {
    /// Bundle an address and secret.
    pub fn new(address: impl Into<String>, secret: SecretKey) -> Self {
        Self { address: address.into(), secret }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex() {
        let key = SecretKey::from_hex("00112233445566778899aabbccddeeff").unwrap();
        assert_eq!(key.as_bytes()[0], 0x00);
        assert_eq!(key.as_bytes()[15], 0xff);
    }

    #[test]
    fn accepts_uppercase_and_whitespace() {
        let key = SecretKey::from_hex("  00112233445566778899AABBCCDDEEFF\n").unwrap();
        assert_eq!(key.as_bytes()[10], 0xaa);
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(SecretKey::from_hex("0011").unwrap_err(), KeyError::InvalidLength(4));
    }

    #[test]
    fn rejects_non_hex() {
        assert_eq!(
            SecretKey::from_hex("zz112233445566778899aabbccddeeff").unwrap_err(),
            KeyError::InvalidHex
        );
    }

    #[test]
    fn debug_is_redacted() {
        let identity =
            DeviceIdentity::new("AA:BB:CC:DD:EE:FF", SecretKey::from_bytes([0x42; 16]));
        let printed = format!("{identity:?}");
        assert!(printed.contains("AA:BB:CC:DD:EE:FF"));
        assert!(printed.contains("redacted"));
        assert!(!printed.contains("66"));
    }
}
