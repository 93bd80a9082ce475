//! Error types for the session core.
//!
//! [`SessionError`] is the full taxonomy. Which errors end a session is
//! decided by the state machine: frame-level problems come back as `Err` from
//! [`crate::Session::receive`] and the session carries on, while failures that
//! require a rebuild are reported as a [`CloseReason`] on a
//! [`crate::SessionAction::Close`].

use std::time::Duration;

use ssm_crypto::CryptoError;
use ssm_proto::ProtocolError;
use thiserror::Error;

use crate::session::SessionState;

/// Errors raised by the session core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Connect, write, or link failure
    #[error("transport error: {0}")]
    Transport(String),

    /// A frame failed authentication
    #[error("authentication failed: {0}")]
    Authentication(#[from] CryptoError),

    /// Peripheral answered the login with a non-zero result
    #[error("login rejected with result code {0}")]
    LoginRejected(u8),

    /// Handshake phase did not complete in time
    #[error("handshake timeout after {elapsed:?}")]
    HandshakeTimeout {
        /// Time spent in the phase
        elapsed: Duration,
    },

    /// Malformed, oversized, or interrupted message
    #[error("frame error: {0}")]
    Frame(#[from] ProtocolError),

    /// Well-formed message that makes no sense in the current state
    #[error("unexpected message in {state:?}: {detail}")]
    UnexpectedMessage {
        /// State when the message arrived
        state: SessionState,
        /// What was wrong
        detail: &'static str,
    },

    /// Command submitted while the session is not ready
    #[error("command rejected in {state:?}")]
    CommandRejected {
        /// State when the command was submitted
        state: SessionState,
    },

    /// Reconnection gave up
    #[error("gave up after {attempts} retries")]
    ExhaustedRetries {
        /// Retries made before giving up
        attempts: u32,
    },

    /// Operation not valid in the current state
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state
        state: SessionState,
        /// Operation attempted
        operation: &'static str,
    },
}

impl SessionError {
    /// True if a fresh session may succeed where this one failed.
    ///
    /// Transport and authentication failures are recovered by rebuilding the
    /// session. Frame errors are absorbed in place, rejected commands are
    /// dropped, and exhausted retries are terminal.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Authentication(_)
                | Self::LoginRejected(_)
                | Self::HandshakeTimeout { .. }
        )
    }
}

/// Why a session reached [`SessionState::Closed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Caller asked for the session to stop
    Requested,
    /// Session ended on its own
    Failed(SessionError),
}

impl CloseReason {
    /// True if the close was asked for.
    pub fn is_requested(&self) -> bool {
        matches!(self, Self::Requested)
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => f.write_str("requested"),
            Self::Failed(err) => write!(f, "{err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebuildable_errors_are_recoverable() {
        assert!(SessionError::Transport("link lost".to_string()).is_recoverable());
        assert!(SessionError::Authentication(CryptoError::AuthenticationFailed).is_recoverable());
        assert!(SessionError::LoginRejected(3).is_recoverable());
        assert!(
            SessionError::HandshakeTimeout { elapsed: Duration::from_secs(6) }.is_recoverable()
        );
    }

    #[test]
    fn absorbed_and_terminal_errors_are_not() {
        assert!(!SessionError::Frame(ProtocolError::OrphanSegment).is_recoverable());
        assert!(
            !SessionError::CommandRejected { state: SessionState::Connecting }.is_recoverable()
        );
        assert!(!SessionError::ExhaustedRetries { attempts: 3 }.is_recoverable());
        assert!(
            !SessionError::InvalidState { state: SessionState::Ready, operation: "open" }
                .is_recoverable()
        );
    }

    #[test]
    fn close_reason_display() {
        assert_eq!(CloseReason::Requested.to_string(), "requested");
        assert_eq!(
            CloseReason::Failed(SessionError::LoginRejected(1)).to_string(),
            "login rejected with result code 1"
        );
    }
}
