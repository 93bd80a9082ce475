//! Lock and unlock commands.
//!
//! Both carry a history tag: a short label the peripheral records next to the
//! operation in its own log.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    errors::{ProtocolError, Result},
    opcodes::ItemCode,
};

/// Sanitized history label.
///
/// Control characters are removed and the result is truncated to at most
/// [`HistoryTag::MAX_LEN`] bytes without splitting a UTF-8 sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct HistoryTag(String);

impl HistoryTag {
    /// Longest tag the peripheral stores, in bytes.
    pub const MAX_LEN: usize = 30;

    /// Build a tag from free text.
    #[must_use]
    pub fn new(label: &str) -> Self {
        let mut tag = String::with_capacity(label.len().min(Self::MAX_LEN));
        for c in label.chars().filter(|c| !c.is_control()) {
            if tag.len() + c.len_utf8() > Self::MAX_LEN {
                break;
            }
            tag.push(c);
        }

        debug_assert!(tag.len() <= Self::MAX_LEN);
        Self(tag)
    }

    /// Tag text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Tag bytes as sent on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<&str> for HistoryTag {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// A command sent once the session is authenticated.
///
/// Wire layout: `item | len(tag) | tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Turn the thumb-turn to the lock position
    Lock(HistoryTag),
    /// Turn the thumb-turn to the unlock position
    Unlock(HistoryTag),
}

impl Command {
    /// Item code for this command.
    pub fn item(&self) -> ItemCode {
        match self {
            Self::Lock(_) => ItemCode::Lock,
            Self::Unlock(_) => ItemCode::Unlock,
        }
    }

    /// History tag carried by the command.
    pub fn tag(&self) -> &HistoryTag {
        match self {
            Self::Lock(tag) | Self::Unlock(tag) => tag,
        }
    }

    /// Serialize to wire layout.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let tag = self.tag().as_bytes();
        let mut buf = BytesMut::with_capacity(2 + tag.len());
        buf.put_u8(self.item().to_u8());
        // Bounded by HistoryTag::MAX_LEN
        buf.put_u8(tag.len() as u8);
        buf.put_slice(tag);
        buf.freeze()
    }

    /// Parse a command body as the peripheral sees it.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MessageTooShort` if the length prefix or tag is
    ///   truncated
    /// - `ProtocolError::UnexpectedItem` if the item is not lock or unlock
    pub fn decode(body: &[u8]) -> Result<Self> {
        let [item, len, rest @ ..] = body else {
            return Err(ProtocolError::MessageTooShort { expected: 2, actual: body.len() });
        };

        let len = usize::from(*len);
        let Some(raw) = rest.get(..len) else {
            return Err(ProtocolError::MessageTooShort { expected: 2 + len, actual: body.len() });
        };
        let tag = HistoryTag::new(&String::from_utf8_lossy(raw));

        match ItemCode::from_u8(*item) {
            ItemCode::Lock => Ok(Self::Lock(tag)),
            ItemCode::Unlock => Ok(Self::Unlock(tag)),
            _ => Err(ProtocolError::UnexpectedItem(*item)),
        }
    }
}
