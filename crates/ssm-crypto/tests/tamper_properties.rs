//! Property tests: any single-bit change to a sealed frame is rejected.

use proptest::prelude::*;
use ssm_crypto::{CryptoError, SessionCipher, derive_session_token};

fn cipher(secret: &[u8; 16], code: [u8; 4]) -> SessionCipher {
    SessionCipher::new(derive_session_token(secret, &code).unwrap(), code)
}

proptest! {
    #[test]
    fn bit_flip_never_decrypts(
        secret in any::<[u8; 16]>(),
        code in any::<[u8; 4]>(),
        plaintext in prop::collection::vec(any::<u8>(), 0..64),
        flip in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut sender = cipher(&secret, code);
        let mut receiver = cipher(&secret, code);

        let mut sealed = sender.encrypt(&plaintext).unwrap();
        let index = flip.index(sealed.len());
        sealed[index] ^= 1 << bit;

        let err = receiver.decrypt(&sealed).unwrap_err();
        prop_assert!(err.is_authentication());
        prop_assert_eq!(receiver.rx_counter(), 0);
    }

    #[test]
    fn untampered_stream_decrypts_in_order(
        secret in any::<[u8; 16]>(),
        code in any::<[u8; 4]>(),
        messages in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 1..8),
    ) {
        let mut sender = cipher(&secret, code);
        let mut receiver = cipher(&secret, code);

        for message in &messages {
            let sealed = sender.encrypt(message).unwrap();
            prop_assert_eq!(&receiver.decrypt(&sealed).unwrap(), message);
        }
        prop_assert_eq!(receiver.rx_counter(), messages.len() as u64);
    }

    #[test]
    fn wrong_secret_never_decrypts(
        secret in any::<[u8; 16]>(),
        other in any::<[u8; 16]>(),
        code in any::<[u8; 4]>(),
    ) {
        prop_assume!(secret != other);
        let mut sender = cipher(&secret, code);
        let mut receiver = cipher(&other, code);

        let sealed = sender.encrypt(b"mech status").unwrap();
        prop_assert_eq!(receiver.decrypt(&sealed).unwrap_err(), CryptoError::AuthenticationFailed);
    }
}
