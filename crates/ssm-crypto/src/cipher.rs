//! Per-session cipher with directional counters.

use crate::{
    aead::{open, seal},
    error::CryptoError,
    token::SessionToken,
};

/// How far around the expected counter a failed frame is retried.
const REORDER_WINDOW: u64 = 2;

/// Session token plus one counter per direction.
///
/// Both ends of a session construct the same cipher: each seals with its own
/// `tx` counter and opens with its own `rx` counter, so the peer's `tx`
/// sequence is this end's `rx` sequence.
///
/// # Invariants
///
/// - `tx` advances on every successful seal, `rx` on every successful open.
///   Neither ever decreases.
/// - Neither counter wraps. At `u64::MAX` the cipher refuses further use.
#[derive(Debug)]
pub struct SessionCipher {
    token: SessionToken,
    random_code: [u8; 4],
    tx: u64,
    rx: u64,
}

impl SessionCipher {
    /// New cipher with both counters at zero.
    pub fn new(token: SessionToken, random_code: [u8; 4]) -> Self {
        Self { token, random_code, tx: 0, rx: 0 }
    }

    /// Next counter used for sealing.
    pub fn tx_counter(&self) -> u64 {
        self.tx
    }

    /// Next counter expected when opening.
    pub fn rx_counter(&self) -> u64 {
        self.rx
    }

    /// Seal a plaintext under the next `tx` counter.
    ///
    /// # Errors
    ///
    /// - `CryptoError::CounterExhausted` if `tx` has reached `u64::MAX`
    /// - `CryptoError::MessageTooLarge` if the plaintext cannot be sealed;
    ///   `tx` is not advanced
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if self.tx == u64::MAX {
            return Err(CryptoError::CounterExhausted);
        }

        let sealed = seal(&self.token, plaintext, self.tx, &self.random_code)?;
        self.tx += 1;
        Ok(sealed)
    }

    /// Open a frame under the next `rx` counter.
    ///
    /// On failure, neighbouring counters are tried so the caller can tell a
    /// replayed or reordered frame from a forged one. The counter is not
    /// advanced on failure.
    ///
    /// # Errors
    ///
    /// - `CryptoError::ReplayOrOrdering` if the frame authenticates under a
    ///   nearby counter
    /// - `CryptoError::AuthenticationFailed` otherwise
    /// - `CryptoError::CounterExhausted` if `rx` has reached `u64::MAX`
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if self.rx == u64::MAX {
            return Err(CryptoError::CounterExhausted);
        }

        match open(&self.token, ciphertext, self.rx, &self.random_code) {
            Ok(plaintext) => {
                self.rx += 1;
                Ok(plaintext)
            },
            Err(err) => Err(self.classify_failure(ciphertext).unwrap_or(err)),
        }
    }

    /// Open a frame that carries an explicit counter.
    ///
    /// # Errors
    ///
    /// - `CryptoError::ReplayOrOrdering` if `counter` is not the expected
    ///   `rx` counter (stale or skipped)
    /// - `CryptoError::AuthenticationFailed` if the tag does not verify
    pub fn decrypt_at(&mut self, ciphertext: &[u8], counter: u64) -> Result<Vec<u8>, CryptoError> {
        if counter != self.rx {
            return Err(CryptoError::ReplayOrOrdering { expected: self.rx, actual: counter });
        }
        self.decrypt(ciphertext)
    }

    fn classify_failure(&self, ciphertext: &[u8]) -> Option<CryptoError> {
        let low = self.rx.saturating_sub(REORDER_WINDOW);
        let high = self.rx.saturating_add(REORDER_WINDOW);

        (low..=high)
            .filter(|&counter| counter != self.rx)
            .find(|&counter| open(&self.token, ciphertext, counter, &self.random_code).is_ok())
            .map(|actual| CryptoError::ReplayOrOrdering { expected: self.rx, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (SessionCipher, SessionCipher) {
        let code = [0x10, 0x20, 0x30, 0x40];
        (
            SessionCipher::new(SessionToken::from_bytes([5u8; 16]), code),
            SessionCipher::new(SessionToken::from_bytes([5u8; 16]), code),
        )
    }

    #[test]
    fn counters_advance_per_direction() {
        let (mut client, mut device) = pair();

        let first = client.encrypt(b"one").unwrap();
        let second = client.encrypt(b"two").unwrap();
        assert_eq!(client.tx_counter(), 2);
        assert_eq!(client.rx_counter(), 0);

        assert_eq!(device.decrypt(&first).unwrap(), b"one");
        assert_eq!(device.decrypt(&second).unwrap(), b"two");
        assert_eq!(device.rx_counter(), 2);
        assert_eq!(device.tx_counter(), 0);
    }

    #[test]
    fn replayed_frame_is_classified() {
        let (mut client, mut device) = pair();

        let first = client.encrypt(b"one").unwrap();
        device.decrypt(&first).unwrap();

        let err = device.decrypt(&first).unwrap_err();
        assert_eq!(err, CryptoError::ReplayOrOrdering { expected: 1, actual: 0 });
        assert_eq!(device.rx_counter(), 1);
    }

    #[test]
    fn skipped_frame_is_classified() {
        let (mut client, mut device) = pair();

        let _lost = client.encrypt(b"one").unwrap();
        let second = client.encrypt(b"two").unwrap();

        let err = device.decrypt(&second).unwrap_err();
        assert_eq!(err, CryptoError::ReplayOrOrdering { expected: 0, actual: 1 });
    }

    #[test]
    fn tampered_frame_fails_authentication() {
        let (mut client, mut device) = pair();

        let mut sealed = client.encrypt(b"status").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;

        assert_eq!(device.decrypt(&sealed).unwrap_err(), CryptoError::AuthenticationFailed);
        assert_eq!(device.rx_counter(), 0);
    }

    #[test]
    fn explicit_counter_must_match() {
        let (mut client, mut device) = pair();
        let sealed = client.encrypt(b"x").unwrap();

        assert_eq!(
            device.decrypt_at(&sealed, 5).unwrap_err(),
            CryptoError::ReplayOrOrdering { expected: 0, actual: 5 }
        );
        assert_eq!(device.decrypt_at(&sealed, 0).unwrap(), b"x");
    }

    #[test]
    fn oversized_message_does_not_advance_counter() {
        let (mut client, mut device) = pair();

        let err = client.encrypt(&vec![0u8; crate::aead::MAX_PLAINTEXT_LEN + 1]).unwrap_err();
        assert!(matches!(err, CryptoError::MessageTooLarge { .. }));
        assert_eq!(client.tx_counter(), 0);

        // The next frame still uses counter 0
        let sealed = client.encrypt(b"after").unwrap();
        assert_eq!(device.decrypt(&sealed).unwrap(), b"after");
    }
}
