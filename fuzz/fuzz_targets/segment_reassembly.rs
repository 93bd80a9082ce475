//! Fuzz target for segment reassembly
//!
//! Feeds arbitrary notification sequences through a codec with an arbitrary
//! size bound.
//!
//! # Invariants
//!
//! - `accept` never panics
//! - Buffered bytes never exceed the message bound
//! - A completed message never exceeds the message bound
//! - A well-formed message fragmented mid-sequence is still reassembled
//!   after any prior garbage

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ssm_proto::FrameCodec;

#[derive(Debug, Arbitrary)]
struct Input {
    write_len: u8,
    max_message_len: u16,
    chunks: Vec<Vec<u8>>,
    tail: Vec<u8>,
    encrypted: bool,
}

fuzz_target!(|input: Input| {
    let write_len = usize::from(input.write_len).max(2);
    let max_message_len = usize::from(input.max_message_len).max(1);
    let Ok(mut codec) = FrameCodec::new(write_len, max_message_len) else {
        return;
    };

    for chunk in &input.chunks {
        if let Ok(Some(message)) = codec.accept(chunk) {
            assert!(message.body.len() <= max_message_len);
        }
        assert!(codec.buffered_len() <= max_message_len);
    }

    if input.tail.is_empty() || input.tail.len() > max_message_len {
        return;
    }
    let Ok(chunks) = codec.fragment(&input.tail, input.encrypted) else {
        return;
    };

    let mut last = None;
    for chunk in &chunks {
        last = codec.accept(chunk).ok().flatten();
    }
    let message = last.expect("fragmented message must reassemble");
    assert_eq!(message.encrypted, input.encrypted);
    assert_eq!(&message.body[..], &input.tail[..]);
});
