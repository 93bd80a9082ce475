//! Fuzz target for message and payload decoding
//!
//! Every decoder must return an error for bad input, never panic.

#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use ssm_proto::{Command, InboundMessage, Initial, LoginAck, LoginRequest, RawMechStatus};

fuzz_target!(|data: &[u8]| {
    let body = Bytes::copy_from_slice(data);

    if let Ok(message) = InboundMessage::parse(&body) {
        let _ = message.item();
        let _ = message.encode();
    }

    let _ = Initial::decode(data);
    let _ = LoginRequest::decode(data);
    let _ = LoginAck::decode(data);
    let _ = Command::decode(data);

    if let Ok(status) = RawMechStatus::decode(data) {
        // Unknown flag bits are dropped; the numeric fields survive
        assert_eq!(&status.encode()[..6], &data[..6]);
    }
});
