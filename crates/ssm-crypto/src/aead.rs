//! Frame encryption using AES-128-CCM
//!
//! All functions are pure: the counter and random code are supplied by the
//! caller. [`crate::SessionCipher`] adds counter bookkeeping on top.

use aes::Aes128;
use ccm::{
    Ccm,
    aead::{Aead, KeyInit, Payload, generic_array::GenericArray},
    consts::{U4, U13},
};

use crate::{error::CryptoError, token::SessionToken};

/// CCM tag size (4 bytes)
pub const TAG_SIZE: usize = 4;

/// CCM nonce size (13 bytes)
pub const NONCE_SIZE: usize = 13;

/// Longest plaintext CCM can seal with a 13-byte nonce (2-byte length field)
pub const MAX_PLAINTEXT_LEN: usize = 0xffff;

/// Associated data bound into every tag
const ASSOCIATED_DATA: &[u8] = &[0x00];

type Aes128Ccm = Ccm<Aes128, U4, U13>;

/// Build the 13-byte nonce.
///
/// Structure:
/// - bytes 0-7: counter (little-endian)
/// - byte 8: zero
/// - bytes 9-12: peripheral random code
pub fn build_nonce(counter: u64, random_code: &[u8; 4]) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[0..8].copy_from_slice(&counter.to_le_bytes());
    nonce[9..13].copy_from_slice(random_code);
    nonce
}

/// Encrypt a plaintext under `counter`.
///
/// Returns `ciphertext ‖ tag` (`plaintext.len() + 4` bytes).
///
/// # Errors
///
/// - `CryptoError::MessageTooLarge` if `plaintext` exceeds
///   [`MAX_PLAINTEXT_LEN`]
pub fn seal(
    token: &SessionToken,
    plaintext: &[u8],
    counter: u64,
    random_code: &[u8; 4],
) -> Result<Vec<u8>, CryptoError> {
    if plaintext.len() > MAX_PLAINTEXT_LEN {
        return Err(CryptoError::MessageTooLarge {
            size: plaintext.len(),
            max: MAX_PLAINTEXT_LEN,
        });
    }

    let cipher = Aes128Ccm::new(token.as_bytes().into());
    let nonce = build_nonce(counter, random_code);

    let ciphertext = cipher
        .encrypt(GenericArray::from_slice(&nonce), Payload { msg: plaintext, aad: ASSOCIATED_DATA })
        .map_err(|_| CryptoError::MessageTooLarge { size: plaintext.len(), max: MAX_PLAINTEXT_LEN })?;

    debug_assert_eq!(ciphertext.len(), plaintext.len() + TAG_SIZE);
    Ok(ciphertext)
}

/// Authenticate and decrypt `ciphertext ‖ tag` under `counter`.
///
/// # Errors
///
/// - `CryptoError::AuthenticationFailed` if the tag does not verify under
///   this key and counter, or the input is shorter than the tag
pub fn open(
    token: &SessionToken,
    ciphertext: &[u8],
    counter: u64,
    random_code: &[u8; 4],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::AuthenticationFailed);
    }

    let cipher = Aes128Ccm::new(token.as_bytes().into());
    let nonce = build_nonce(counter, random_code);

    cipher
        .decrypt(GenericArray::from_slice(&nonce), Payload { msg: ciphertext, aad: ASSOCIATED_DATA })
        .map_err(|_| CryptoError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> SessionToken {
        SessionToken::from_bytes([7u8; 16])
    }

    #[test]
    fn nonce_layout() {
        let nonce = build_nonce(0x0102, &[0xaa, 0xbb, 0xcc, 0xdd]);
        assert_eq!(nonce, [0x02, 0x01, 0, 0, 0, 0, 0, 0, 0x00, 0xaa, 0xbb, 0xcc, 0xdd]);
    }

    #[test]
    fn seal_appends_four_byte_tag() {
        let sealed = seal(&token(), b"hello", 0, &[1, 2, 3, 4]).unwrap();
        assert_eq!(sealed.len(), 5 + TAG_SIZE);
        assert_ne!(&sealed[..5], b"hello");
    }

    #[test]
    fn open_recovers_plaintext() {
        let code = [1, 2, 3, 4];
        let sealed = seal(&token(), b"hello", 3, &code).unwrap();
        assert_eq!(open(&token(), &sealed, 3, &code).unwrap(), b"hello");
    }

    #[test]
    fn wrong_counter_fails() {
        let code = [1, 2, 3, 4];
        let sealed = seal(&token(), b"hello", 3, &code).unwrap();
        assert_eq!(open(&token(), &sealed, 4, &code), Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn wrong_random_code_fails() {
        let sealed = seal(&token(), b"hello", 0, &[1, 2, 3, 4]).unwrap();
        assert_eq!(
            open(&token(), &sealed, 0, &[1, 2, 3, 5]),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn short_input_fails() {
        assert_eq!(open(&token(), &[0, 1, 2], 0, &[0; 4]), Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn empty_plaintext_is_tag_only() {
        let code = [9, 9, 9, 9];
        let sealed = seal(&token(), &[], 0, &code).unwrap();
        assert_eq!(sealed.len(), TAG_SIZE);
        assert_eq!(open(&token(), &sealed, 0, &code).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn oversized_plaintext_is_rejected() {
        let code = [1, 2, 3, 4];
        assert_eq!(
            seal(&token(), &vec![0u8; 70_000], 0, &code),
            Err(CryptoError::MessageTooLarge { size: 70_000, max: MAX_PLAINTEXT_LEN })
        );

        let large = seal(&token(), &vec![0u8; 60_000], 0, &code).unwrap();
        assert_eq!(large.len(), 60_000 + TAG_SIZE);
    }
}
