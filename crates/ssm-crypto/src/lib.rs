//! Session cryptography for SESAME OS3 locks.
//!
//! Pure functions and a small stateful cipher. No randomness is generated
//! here: the only per-session entropy is the peripheral's random code, which
//! the caller passes in.
//!
//! # Key Lifecycle
//!
//! ```text
//! Registration secret (16 bytes, never transmitted)
//!        │
//!        ▼
//! AES-CMAC(secret, random_code) → Session token (16 bytes)
//!        │                          │
//!        │                          └─ token[0..4] sent as login proof
//!        ▼
//! AES-128-CCM(token, nonce = counter ‖ 0x00 ‖ random_code) → Ciphertext
//! ```
//!
//! A new random code is published on every connection, so every session gets
//! a fresh token. Tokens are zeroized when dropped.
//!
//! # Security
//!
//! Replay protection:
//! - Each direction keeps its own counter, starting at zero per session
//! - The counter is part of the nonce, so a replayed or reordered frame fails
//!   authentication under the expected counter
//! - Counters never wrap: exhaustion is an error
//!
//! Authenticity:
//! - 4-byte CCM tag over the ciphertext and the one-byte associated data
//! - Failed authentication is reported, never retried in place

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aead;
pub mod cipher;
pub mod error;
pub mod token;

pub use aead::{MAX_PLAINTEXT_LEN, NONCE_SIZE, TAG_SIZE, build_nonce, open, seal};
pub use cipher::SessionCipher;
pub use error::CryptoError;
pub use token::{RANDOM_CODE_SIZE, SECRET_KEY_SIZE, SessionToken, derive_session_token};
