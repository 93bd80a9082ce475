//! Errors for session cryptography

use thiserror::Error;

/// Errors from key derivation and frame encryption.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Tag did not verify, or the ciphertext is shorter than the tag
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Frame authenticated under a counter other than the expected one
    #[error("replay or reordering: expected counter {expected}, got {actual}")]
    ReplayOrOrdering {
        /// Counter the receiver expected
        expected: u64,
        /// Counter the frame was sealed with
        actual: u64,
    },

    /// Counter reached its maximum; the session must be rebuilt
    #[error("counter exhausted")]
    CounterExhausted,

    /// Plaintext longer than CCM can seal under this nonce size
    #[error("message of {size} bytes exceeds maximum {max}")]
    MessageTooLarge {
        /// Plaintext length
        size: usize,
        /// Largest sealable plaintext
        max: usize,
    },

    /// Secret key has the wrong length
    #[error("invalid key length {len}, expected 16")]
    InvalidKey {
        /// Length supplied
        len: usize,
    },
}

impl CryptoError {
    /// True for failures that indicate a forged, replayed, or corrupted frame.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::AuthenticationFailed | Self::ReplayOrOrdering { .. })
    }
}
