//! Session token derivation using AES-CMAC

use std::fmt;

use aes::Aes128;
use cmac::{Cmac, Mac};
use zeroize::Zeroize;

use crate::error::CryptoError;

/// Registration secret size (AES-128 key)
pub const SECRET_KEY_SIZE: usize = 16;

/// Size of the peripheral's random code
pub const RANDOM_CODE_SIZE: usize = 4;

/// Per-session key, derived from the registration secret.
///
/// Zeroized on drop. `Debug` never prints the key.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    key: [u8; 16],
}

impl SessionToken {
    /// Construct from raw key bytes.
    pub fn from_bytes(key: [u8; 16]) -> Self {
        Self { key }
    }

    /// Key bytes, for the AEAD.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.key
    }

    /// First four bytes, sent during login as proof of possession.
    pub fn login_prefix(&self) -> [u8; 4] {
        let mut prefix = [0u8; 4];
        prefix.copy_from_slice(&self.key[..4]);
        prefix
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken").field("key", &"<redacted>").finish()
    }
}

impl Drop for SessionToken {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Derive the session token: `AES-CMAC(secret, random_code)`.
///
/// # Errors
///
/// - `CryptoError::InvalidKey` if `secret` is not 16 bytes
///
/// # Security
///
/// - Deterministic: same secret and code always produce the same token
/// - A fresh random code per connection yields a fresh token per session
pub fn derive_session_token(
    secret: &[u8],
    random_code: &[u8; RANDOM_CODE_SIZE],
) -> Result<SessionToken, CryptoError> {
    let key = aes_cmac(secret, random_code)?;
    Ok(SessionToken { key })
}

fn aes_cmac(key: &[u8], message: &[u8]) -> Result<[u8; 16], CryptoError> {
    let mut mac = <Cmac<Aes128> as Mac>::new_from_slice(key)
        .map_err(|_| CryptoError::InvalidKey { len: key.len() })?;
    mac.update(message);

    let mut out = [0u8; 16];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    const RFC4493_KEY: [u8; 16] = hex!("2b7e151628aed2a6abf7158809cf4f3c");

    #[test]
    fn cmac_matches_rfc4493_empty_message() {
        assert_eq!(aes_cmac(&RFC4493_KEY, &[]).unwrap(), hex!("bb1d6929e95937287fa37d129b756746"));
    }

    #[test]
    fn cmac_matches_rfc4493_one_block() {
        let message = hex!("6bc1bee22e409f96e93d7e117393172a");
        assert_eq!(
            aes_cmac(&RFC4493_KEY, &message).unwrap(),
            hex!("070a16b46b4d4144f79bdd9dd04a287c")
        );
    }

    #[test]
    fn derive_is_deterministic() {
        let a = derive_session_token(&RFC4493_KEY, &[1, 2, 3, 4]).unwrap();
        let b = derive_session_token(&RFC4493_KEY, &[1, 2, 3, 4]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_codes_give_different_tokens() {
        let a = derive_session_token(&RFC4493_KEY, &[1, 2, 3, 4]).unwrap();
        let b = derive_session_token(&RFC4493_KEY, &[1, 2, 3, 5]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_wrong_key_length() {
        let err = derive_session_token(&[0u8; 15], &[0; 4]).unwrap_err();
        assert_eq!(err, CryptoError::InvalidKey { len: 15 });
    }

    #[test]
    fn debug_is_redacted() {
        let token = SessionToken::from_bytes([0xab; 16]);
        let printed = format!("{token:?}");
        assert!(!printed.contains("ab"));
        assert!(!printed.contains("171"));
    }

    #[test]
    fn login_prefix_is_leading_bytes() {
        let token = SessionToken::from_bytes(hex!("00112233445566778899aabbccddeeff"));
        assert_eq!(token.login_prefix(), hex!("00112233"));
    }
}
