//! Fuzz target for the session state machine
//!
//! Drives a session through connect and then feeds it arbitrary
//! notifications and ticks.
//!
//! # Invariants
//!
//! - No input panics the session
//! - Arbitrary bytes never produce a decoded status: status records only
//!   come from authenticated frames, and the fuzzer cannot forge a tag
//! - After a close action the session is closed

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ssm_core::{DeviceIdentity, SecretKey, Session, SessionAction, SessionConfig, SessionState};

#[derive(Debug, Arbitrary)]
enum Event {
    Notify(Vec<u8>),
    Tick(u16),
    LinkLost,
}

fuzz_target!(|events: Vec<Event>| {
    let mut session = Session::<Duration>::new(SessionConfig::default());
    let identity = DeviceIdentity::new("AA:BB:CC:DD:EE:FF", SecretKey::from_bytes([0x42; 16]));

    let mut now = Duration::ZERO;
    if session.open(identity).is_err() || session.transport_connected(20, now).is_err() {
        return;
    }

    for event in events {
        let actions = match event {
            Event::Notify(chunk) => session.receive(&chunk, now).unwrap_or_default(),
            Event::Tick(millis) => {
                now += Duration::from_millis(u64::from(millis));
                session.tick(now)
            },
            Event::LinkLost => session.transport_failed("link lost"),
        };

        for action in &actions {
            assert!(!matches!(action, SessionAction::StatusDecoded(_)));
            assert!(!matches!(action, SessionAction::Connected { .. }));
            if matches!(action, SessionAction::Close { .. }) {
                assert_eq!(session.state(), SessionState::Closed);
            }
        }
    }
});
