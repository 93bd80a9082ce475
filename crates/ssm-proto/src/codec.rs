//! Segmentation and reassembly of logical messages.
//!
//! The write characteristic accepts at most [`DEFAULT_WRITE_LEN`] bytes per
//! write. Each chunk on the wire is `[SegmentFlags] + [body]`. Outbound
//! messages are split by [`FrameCodec::fragment`]; inbound notifications are
//! fed to [`FrameCodec::accept`] one at a time until a terminator arrives.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    errors::{ProtocolError, Result},
    flags::SegmentFlags,
};

/// Default maximum bytes per transport write (header included).
pub const DEFAULT_WRITE_LEN: usize = 20;

/// Default bound on a reassembled message.
///
/// The largest message the peripheral emits is well under this; anything
/// beyond it is a misbehaving or hostile peer.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 512;

/// A reassembled logical message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Body bytes with all segment headers stripped
    pub body: Bytes,
    /// True if the final segment carried the encrypted terminator
    pub encrypted: bool,
}

/// Bidirectional segment codec.
///
/// Holds at most one partially reassembled inbound message. A new start
/// segment discards any message in progress, so a lost terminator costs one
/// message rather than wedging the stream.
///
/// # Invariants
///
/// - Bounded: the reassembly buffer never exceeds `max_message_len`. Input
///   that would exceed it discards the partial message and returns
///   [`ProtocolError::FrameTooLarge`].
/// - Complete only: [`FrameCodec::accept`] yields a message only after a
///   segment carrying a terminator bit.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    write_len: usize,
    max_message_len: usize,
    buffer: BytesMut,
    assembling: bool,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self {
            write_len: DEFAULT_WRITE_LEN,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            buffer: BytesMut::new(),
            assembling: false,
        }
    }
}

impl FrameCodec {
    /// Create a codec with the given write size and reassembly bound.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidWriteSize` if `write_len` cannot carry a header
    ///   byte plus at least one body byte
    pub fn new(write_len: usize, max_message_len: usize) -> Result<Self> {
        if write_len < 2 {
            return Err(ProtocolError::InvalidWriteSize(write_len));
        }

        Ok(Self { write_len, max_message_len, ..Self::default() })
    }

    /// Maximum bytes per transport write.
    pub fn write_len(&self) -> usize {
        self.write_len
    }

    /// Reassembly bound.
    pub fn max_message_len(&self) -> usize {
        self.max_message_len
    }

    /// Bytes currently held for a partial message.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// True while a start segment has been seen but no terminator.
    pub fn is_assembling(&self) -> bool {
        self.assembling
    }

    /// Split a logical message into transport chunks.
    ///
    /// Each chunk carries a header byte and up to `write_len - 1` body bytes.
    /// The first chunk carries [`SegmentFlags::START`]; the last carries the
    /// plaintext or encrypted terminator. An empty payload yields a single
    /// header-only chunk.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if `payload` exceeds the reassembly
    ///   bound (the peer would reject it)
    pub fn fragment(&self, payload: &[u8], encrypted: bool) -> Result<Vec<Bytes>> {
        if payload.len() > self.max_message_len {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_message_len,
            });
        }

        let body_len = self.write_len - 1;

        if payload.is_empty() {
            let flags = SegmentFlags::for_segment(true, true, encrypted);
            return Ok(vec![Bytes::copy_from_slice(&[flags.bits()])]);
        }

        let count = payload.len().div_ceil(body_len);
        let mut chunks = Vec::with_capacity(count);

        for (index, body) in payload.chunks(body_len).enumerate() {
            let flags = SegmentFlags::for_segment(index == 0, index + 1 == count, encrypted);
            let mut chunk = BytesMut::with_capacity(1 + body.len());
            chunk.put_u8(flags.bits());
            chunk.put_slice(body);
            chunks.push(chunk.freeze());
        }

        debug_assert_eq!(chunks.len(), count);
        Ok(chunks)
    }

    /// Feed one inbound notification.
    ///
    /// Returns `Ok(Some(message))` when the chunk completes a message,
    /// `Ok(None)` when more segments are needed.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::EmptySegment` if `chunk` has no header byte
    /// - `ProtocolError::OrphanSegment` if a continuation arrives with no
    ///   message in progress; the chunk is dropped
    /// - `ProtocolError::FrameTooLarge` if the message would exceed the bound;
    ///   the partial message is discarded
    ///
    /// # Security
    ///
    /// The returned body is not authenticated. Encrypted messages must be
    /// opened by the session cipher before any field is trusted.
    pub fn accept(&mut self, chunk: &[u8]) -> Result<Option<Message>> {
        let Some((&header, body)) = chunk.split_first() else {
            return Err(ProtocolError::EmptySegment);
        };
        let flags = SegmentFlags::from_byte(header);

        if flags.is_start() {
            self.reset();
            self.assembling = true;
        } else if !self.assembling {
            return Err(ProtocolError::OrphanSegment);
        }

        let size = self.buffer.len() + body.len();
        if size > self.max_message_len {
            self.reset();
            return Err(ProtocolError::FrameTooLarge { size, max: self.max_message_len });
        }

        self.buffer.extend_from_slice(body);
        debug_assert!(self.buffer.len() <= self.max_message_len);

        if !flags.is_end() {
            return Ok(None);
        }

        self.assembling = false;
        let body = self.buffer.split().freeze();
        Ok(Some(Message { body, encrypted: flags.is_encrypted() }))
    }

    /// Discard any partial message.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.assembling = false;
    }
}
