//! Session layer state machine.
//!
//! Owns one connection to one lock: transport connect, login handshake,
//! authenticated steady state, and teardown. Uses the action pattern: methods
//! take time as input and return [`SessionAction`]s for the driver to execute.
//! The state machine never performs I/O.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐ open ┌────────────┐ connected ┌────────────────┐ login ok ┌───────┐
//! │ Idle │─────>│ Connecting │──────────>│ Authenticating │─────────>│ Ready │
//! └──────┘      └────────────┘           └────────────────┘          └───────┘
//!                     │                          │                       │
//!                     │ connect failed           │ timeout / auth / link │ close
//!                     ↓                          ↓                       ↓
//!                ┌────────┐<────────────────────────────────────┐  ┌─────────┐
//!                │ Closed │<─────────────────────────────────────┴──│ Closing │
//!                └────────┘                                         └─────────┘
//! ```
//!
//! # Handshake
//!
//! While authenticating, the peripheral publishes its random code in a
//! plaintext INITIAL message. The session derives the token, sends the
//! plaintext login request, and waits for the encrypted login response. Each
//! of the two phases has its own deadline, checked by [`Session::tick`].

use std::{
    ops::Sub,
    time::{Duration, Instant},
};

use bytes::Bytes;
use ssm_crypto::{CryptoError, SessionCipher, derive_session_token};
use ssm_proto::{
    Command, DEFAULT_MAX_MESSAGE_LEN, DEFAULT_WRITE_LEN, FrameCodec, InboundMessage, Initial,
    ItemCode, LoginAck, LoginRequest, RawMechStatus, Response,
};
use tracing::{debug, info, warn};

use crate::{
    error::{CloseReason, SessionError},
    identity::DeviceIdentity,
};

/// Time allowed for each handshake phase.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Actions returned by the session state machine.
///
/// The driver executes these in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Open a transport link to this address
    ConnectTransport {
        /// Device address
        address: String,
    },

    /// Write one chunk to the link
    Write(Bytes),

    /// Login completed; the session is ready
    Connected {
        /// Peripheral clock reported in the login response
        login_timestamp: u32,
    },

    /// An authenticated status record arrived
    StatusDecoded(RawMechStatus),

    /// Tear down the transport link
    Disconnect,

    /// Session is closed
    Close {
        /// Why the session closed
        reason: CloseReason,
    },
}

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Never opened
    Idle,
    /// Waiting for the transport link
    Connecting,
    /// Link up, login handshake in progress
    Authenticating,
    /// Logged in; commands accepted
    Ready,
    /// Close requested, waiting for the link to go down
    Closing,
    /// Closed (requested or failed)
    Closed,
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deadline for each handshake phase
    pub handshake_timeout: Duration,
    /// Reassembly bound for inbound messages
    pub max_message_len: usize,
    /// Upper bound on chunk size; the link may lower it
    pub max_write_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            max_write_len: DEFAULT_WRITE_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handshake {
    AwaitingInitial,
    AwaitingLogin,
}

/// Session state machine
///
/// This is a pure state machine: no I/O, no Environment storage. Time is
/// passed to the methods that need it.
///
/// Generic over `Instant` so tests can drive it with virtual time.
///
/// # Invariants
///
/// - A cipher exists only between receipt of the random code and close.
///   Closing drops it, which zeroizes the token.
/// - Commands are encoded only in [`SessionState::Ready`].
/// - Status records are emitted only from frames that were reassembled and
///   authenticated.
#[derive(Debug)]
pub struct Session<I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    state: SessionState,
    config: SessionConfig,
    codec: FrameCodec,
    identity: Option<DeviceIdentity>,
    cipher: Option<SessionCipher>,
    handshake: Handshake,
    /// Start of the current handshake phase
    phase_started: Option<I>,
    login_timestamp: Option<u32>,
}

impl<I> Session<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create a session in [`SessionState::Idle`].
    pub fn new(config: SessionConfig) -> Self {
        Self {
            state: SessionState::Idle,
            config,
            codec: FrameCodec::default(),
            identity: None,
            cipher: None,
            handshake: Handshake::AwaitingInitial,
            phase_started: None,
            login_timestamp: None,
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True once logged in.
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Peripheral clock from the last successful login.
    pub fn login_timestamp(&self) -> Option<u32> {
        self.login_timestamp
    }

    /// Address of the device this session targets.
    pub fn address(&self) -> Option<&str> {
        self.identity.as_ref().map(|identity| identity.address.as_str())
    }

    /// Start a new session.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` unless [`SessionState::Idle`] or
    ///   [`SessionState::Closed`]
    pub fn open(&mut self, identity: DeviceIdentity) -> Result<Vec<SessionAction>, SessionError> {
        if !matches!(self.state, SessionState::Idle | SessionState::Closed) {
            return Err(SessionError::InvalidState { state: self.state, operation: "open" });
        }

        let address = identity.address.clone();
        self.wipe();
        self.identity = Some(identity);
        self.login_timestamp = None;
        self.state = SessionState::Connecting;

        debug!(%address, "opening session");
        Ok(vec![SessionAction::ConnectTransport { address }])
    }

    /// Transport link is up with notifications enabled.
    ///
    /// `write_len` is the link's maximum write size; the smaller of it and
    /// the configured bound is used.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` unless [`SessionState::Connecting`]
    pub fn transport_connected(
        &mut self,
        write_len: usize,
        now: I,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::Connecting {
            return Err(SessionError::InvalidState {
                state: self.state,
                operation: "transport_connected",
            });
        }

        let write_len = write_len.min(self.config.max_write_len);
        match FrameCodec::new(write_len, self.config.max_message_len) {
            Ok(codec) => self.codec = codec,
            Err(err) => {
                warn!(write_len, error = %err, "link cannot carry frames");
                // The link is already up, so it must be torn down with the session
                let mut actions = vec![SessionAction::Disconnect];
                actions.extend(self.fail(SessionError::Frame(err)));
                return Ok(actions);
            },
        }

        self.state = SessionState::Authenticating;
        self.handshake = Handshake::AwaitingInitial;
        self.phase_started = Some(now);

        debug!(write_len, "transport connected, awaiting random code");
        Ok(Vec::new())
    }

    /// Transport connect failed, a write failed, or the link dropped.
    pub fn transport_failed(&mut self, detail: impl Into<String>) -> Vec<SessionAction> {
        match self.state {
            SessionState::Connecting | SessionState::Authenticating | SessionState::Ready => {
                self.fail(SessionError::Transport(detail.into()))
            },
            SessionState::Closing => self.finish_close(),
            SessionState::Idle | SessionState::Closed => Vec::new(),
        }
    }

    /// Process one inbound notification.
    ///
    /// Failures that end the session (authentication, login rejection) are
    /// returned as a [`SessionAction::Close`]. An `Err` means only the
    /// current message was dropped.
    ///
    /// # Errors
    ///
    /// - `SessionError::Frame` for malformed or oversized messages
    /// - `SessionError::UnexpectedMessage` for an encrypted message before the
    ///   key exists
    pub fn receive(&mut self, chunk: &[u8], now: I) -> Result<Vec<SessionAction>, SessionError> {
        if !matches!(self.state, SessionState::Authenticating | SessionState::Ready) {
            return Ok(Vec::new());
        }

        let Some(message) = self.codec.accept(chunk)? else {
            return Ok(Vec::new());
        };

        if !message.encrypted {
            return self.handle_plaintext(&message.body, now);
        }

        let Some(cipher) = self.cipher.as_mut() else {
            return Err(SessionError::UnexpectedMessage {
                state: self.state,
                detail: "encrypted message before key exchange",
            });
        };

        let plaintext = match cipher.decrypt(&message.body) {
            Ok(plaintext) => Bytes::from(plaintext),
            Err(err) => {
                warn!(error = %err, "inbound frame failed authentication");
                return Ok(self.fail(SessionError::Authentication(err)));
            },
        };

        let inbound = InboundMessage::parse(&plaintext)?;
        self.handle_encrypted(inbound)
    }

    /// Encode, encrypt, and fragment a command.
    ///
    /// # Errors
    ///
    /// - `SessionError::CommandRejected` unless [`SessionState::Ready`]
    /// - `SessionError::Authentication` if the command is too large to seal;
    ///   the session stays ready
    pub fn send(&mut self, command: &Command) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::Ready {
            return Err(SessionError::CommandRejected { state: self.state });
        }

        let Some(cipher) = self.cipher.as_mut() else {
            return Err(SessionError::InvalidState { state: self.state, operation: "send" });
        };

        let sealed = match cipher.encrypt(&command.encode()) {
            Ok(sealed) => sealed,
            // Nothing was sent and the counter did not move
            Err(err @ CryptoError::MessageTooLarge { .. }) => {
                return Err(SessionError::Authentication(err));
            },
            Err(err) => return Ok(self.fail(SessionError::Authentication(err))),
        };

        let chunks = self.codec.fragment(&sealed, true)?;
        debug!(item = ?command.item(), tag = command.tag().as_str(), chunks = chunks.len(), "sending command");

        Ok(chunks.into_iter().map(SessionAction::Write).collect())
    }

    /// Check handshake deadlines.
    pub fn tick(&mut self, now: I) -> Vec<SessionAction> {
        if self.state != SessionState::Authenticating {
            return Vec::new();
        }

        let Some(started) = self.phase_started else {
            return Vec::new();
        };

        let elapsed = now - started;
        if elapsed > self.config.handshake_timeout {
            warn!(phase = ?self.handshake, ?elapsed, "handshake timed out");
            return self.fail(SessionError::HandshakeTimeout { elapsed });
        }

        Vec::new()
    }

    /// Request an orderly close.
    ///
    /// Drops key material immediately and asks the driver to disconnect. The
    /// driver calls [`Session::finish_close`] once the link is down.
    pub fn close(&mut self) -> Vec<SessionAction> {
        match self.state {
            SessionState::Connecting | SessionState::Authenticating | SessionState::Ready => {
                debug!(state = ?self.state, "closing session");
                self.wipe();
                self.state = SessionState::Closing;
                vec![SessionAction::Disconnect]
            },
            SessionState::Idle | SessionState::Closing | SessionState::Closed => Vec::new(),
        }
    }

    /// Link is down after a requested close.
    pub fn finish_close(&mut self) -> Vec<SessionAction> {
        if self.state != SessionState::Closing {
            return Vec::new();
        }

        self.state = SessionState::Closed;
        vec![SessionAction::Close { reason: CloseReason::Requested }]
    }

    fn handle_plaintext(&mut self, body: &Bytes, now: I) -> Result<Vec<SessionAction>, SessionError> {
        let inbound = InboundMessage::parse(body)?;

        match inbound {
            InboundMessage::Publish { item: ItemCode::Initial, payload }
                if self.state == SessionState::Authenticating
                    && self.handshake == Handshake::AwaitingInitial =>
            {
                self.begin_login(&payload, now)
            },
            other => {
                debug!(item = ?other.item(), state = ?self.state, "ignoring plaintext message");
                Ok(Vec::new())
            },
        }
    }

    fn begin_login(&mut self, payload: &[u8], now: I) -> Result<Vec<SessionAction>, SessionError> {
        let initial = Initial::decode(payload)?;

        let Some(identity) = self.identity.as_ref() else {
            return Err(SessionError::InvalidState { state: self.state, operation: "login" });
        };
        let token = derive_session_token(identity.secret.as_bytes(), &initial.random_code)?;

        let request = LoginRequest { token_prefix: token.login_prefix() };
        let chunks = self.codec.fragment(&request.encode(), false)?;

        self.cipher = Some(SessionCipher::new(token, initial.random_code));
        self.handshake = Handshake::AwaitingLogin;
        self.phase_started = Some(now);

        debug!("random code received, sending login");
        Ok(chunks.into_iter().map(SessionAction::Write).collect())
    }

    fn handle_encrypted(
        &mut self,
        inbound: InboundMessage,
    ) -> Result<Vec<SessionAction>, SessionError> {
        match (self.state, inbound) {
            (SessionState::Authenticating, InboundMessage::Response(response))
                if response.item == ItemCode::Login =>
            {
                Ok(self.complete_login(&response))
            },
            (SessionState::Ready, InboundMessage::Publish { item: ItemCode::MechStatus, payload }) => {
                let raw = RawMechStatus::decode(&payload)?;
                Ok(vec![SessionAction::StatusDecoded(raw)])
            },
            (SessionState::Ready, InboundMessage::Response(response))
                if matches!(response.item, ItemCode::Lock | ItemCode::Unlock) =>
            {
                if response.result.is_success() {
                    debug!(item = ?response.item, "command accepted");
                } else {
                    warn!(item = ?response.item, result = response.result.0, "command rejected by device");
                }
                Ok(Vec::new())
            },
            (state, other) => {
                debug!(item = ?other.item(), ?state, "ignoring message");
                Ok(Vec::new())
            },
        }
    }

    fn complete_login(&mut self, response: &Response) -> Vec<SessionAction> {
        if !response.result.is_success() {
            warn!(result = response.result.0, "login rejected");
            return self.fail(SessionError::LoginRejected(response.result.0));
        }

        let ack = match LoginAck::decode(&response.payload) {
            Ok(ack) => ack,
            Err(err) => return self.fail(SessionError::Frame(err)),
        };

        self.state = SessionState::Ready;
        self.phase_started = None;
        self.login_timestamp = Some(ack.timestamp);

        info!(address = self.address().unwrap_or_default(), timestamp = ack.timestamp, "login succeeded");
        vec![SessionAction::Connected { login_timestamp: ack.timestamp }]
    }

    fn fail(&mut self, error: SessionError) -> Vec<SessionAction> {
        let had_link = matches!(self.state, SessionState::Authenticating | SessionState::Ready);

        self.wipe();
        self.state = SessionState::Closed;

        let mut actions = Vec::with_capacity(2);
        if had_link {
            actions.push(SessionAction::Disconnect);
        }
        actions.push(SessionAction::Close { reason: CloseReason::Failed(error) });
        actions
    }

    fn wipe(&mut self) {
        self.cipher = None;
        self.identity = None;
        self.codec.reset();
        self.handshake = Handshake::AwaitingInitial;
        self.phase_started = None;
    }
}

#[cfg(test)]
mod tests {
    use ssm_crypto::CryptoError;
    use ssm_proto::{HistoryTag, ResultCode};

    use super::*;
    use crate::identity::SecretKey;

    const SECRET: [u8; 16] = [0x11; 16];
    const CODE: [u8; 4] = [0xde, 0xad, 0xbe, 0xef];

    type TestSession = Session<Duration>;

    fn identity() -> DeviceIdentity {
        DeviceIdentity::new("AA:BB:CC:DD:EE:FF", SecretKey::from_bytes(SECRET))
    }

    fn device_cipher() -> SessionCipher {
        SessionCipher::new(derive_session_token(&SECRET, &CODE).unwrap(), CODE)
    }

    fn chunks(body: &[u8], encrypted: bool) -> Vec<Bytes> {
        FrameCodec::default().fragment(body, encrypted).unwrap()
    }

    fn initial() -> Vec<Bytes> {
        let publish = InboundMessage::Publish {
            item: ItemCode::Initial,
            payload: Bytes::copy_from_slice(&CODE),
        };
        chunks(&publish.encode(), false)
    }

    fn login_response(device: &mut SessionCipher, result: u8, timestamp: u32) -> Vec<Bytes> {
        let response = InboundMessage::Response(Response {
            item: ItemCode::Login,
            result: ResultCode(result),
            payload: LoginAck { timestamp }.encode(),
        });
        chunks(&device.encrypt(&response.encode()).unwrap(), true)
    }

    fn status_publish(device: &mut SessionCipher, raw: &RawMechStatus) -> Vec<Bytes> {
        let publish = InboundMessage::Publish {
            item: ItemCode::MechStatus,
            payload: Bytes::copy_from_slice(&raw.encode()),
        };
        chunks(&device.encrypt(&publish.encode()).unwrap(), true)
    }

    fn feed(session: &mut TestSession, chunks: &[Bytes], now: Duration) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        for chunk in chunks {
            actions.extend(session.receive(chunk, now).unwrap());
        }
        actions
    }

    fn ready_session() -> (TestSession, SessionCipher) {
        let mut session = TestSession::new(SessionConfig::default());
        let mut device = device_cipher();
        let t0 = Duration::ZERO;

        session.open(identity()).unwrap();
        session.transport_connected(20, t0).unwrap();
        feed(&mut session, &initial(), t0);
        let actions = feed(&mut session, &login_response(&mut device, 0, 1_700_000_000), t0);

        assert_eq!(actions, vec![SessionAction::Connected { login_timestamp: 1_700_000_000 }]);
        (session, device)
    }

    #[test]
    fn handshake_lifecycle() {
        let mut session = TestSession::new(SessionConfig::default());
        let t0 = Duration::ZERO;
        assert_eq!(session.state(), SessionState::Idle);

        let actions = session.open(identity()).unwrap();
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(actions, vec![SessionAction::ConnectTransport {
            address: "AA:BB:CC:DD:EE:FF".to_string()
        }]);

        assert!(session.transport_connected(20, t0).unwrap().is_empty());
        assert_eq!(session.state(), SessionState::Authenticating);

        // Login request: plaintext LOGIN + first four token bytes
        let actions = feed(&mut session, &initial(), t0);
        let token = derive_session_token(&SECRET, &CODE).unwrap();
        let mut expected = vec![0b011, 2];
        expected.extend_from_slice(&token.login_prefix());
        assert_eq!(actions, vec![SessionAction::Write(Bytes::from(expected))]);

        let mut device = device_cipher();
        let actions = feed(&mut session, &login_response(&mut device, 0, 42), t0);
        assert_eq!(actions, vec![SessionAction::Connected { login_timestamp: 42 }]);
        assert!(session.is_ready());
        assert_eq!(session.login_timestamp(), Some(42));
    }

    #[test]
    fn login_rejection_closes() {
        let mut session = TestSession::new(SessionConfig::default());
        let mut device = device_cipher();
        session.open(identity()).unwrap();
        session.transport_connected(20, Duration::ZERO).unwrap();
        feed(&mut session, &initial(), Duration::ZERO);

        let actions = feed(&mut session, &login_response(&mut device, 7, 0), Duration::ZERO);
        assert_eq!(actions, vec![SessionAction::Disconnect, SessionAction::Close {
            reason: CloseReason::Failed(SessionError::LoginRejected(7))
        }]);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn wrong_secret_fails_authentication() {
        let mut session = TestSession::new(SessionConfig::default());
        let mut device = SessionCipher::new(derive_session_token(&[0x22; 16], &CODE).unwrap(), CODE);
        session.open(identity()).unwrap();
        session.transport_connected(20, Duration::ZERO).unwrap();
        feed(&mut session, &initial(), Duration::ZERO);

        let actions = feed(&mut session, &login_response(&mut device, 0, 0), Duration::ZERO);
        assert!(matches!(
            actions.last(),
            Some(SessionAction::Close { reason: CloseReason::Failed(SessionError::Authentication(_)) })
        ));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn handshake_phases_time_out() {
        let config = SessionConfig::default();
        let timeout = config.handshake_timeout;
        let mut session = TestSession::new(config);
        let t0 = Duration::ZERO;

        session.open(identity()).unwrap();
        session.transport_connected(20, t0).unwrap();
        assert!(session.tick(t0 + timeout).is_empty());

        // Random code restarts the deadline
        feed(&mut session, &initial(), t0 + timeout);
        assert!(session.tick(t0 + timeout * 2).is_empty());

        let later = t0 + timeout * 2 + Duration::from_millis(100);
        let actions = session.tick(later);
        assert_eq!(actions, vec![SessionAction::Disconnect, SessionAction::Close {
            reason: CloseReason::Failed(SessionError::HandshakeTimeout {
                elapsed: timeout + Duration::from_millis(100)
            })
        }]);
    }

    #[test]
    fn status_publish_is_decoded() {
        let (mut session, mut device) = ready_session();
        let raw = RawMechStatus { battery: 2978, position: -17, is_lock_range: true, ..Default::default() };

        let actions = feed(&mut session, &status_publish(&mut device, &raw), Duration::ZERO);
        assert_eq!(actions, vec![SessionAction::StatusDecoded(raw)]);
    }

    #[test]
    fn plaintext_status_is_ignored() {
        let (mut session, _device) = ready_session();
        let raw = RawMechStatus { battery: 1, ..Default::default() };
        let publish = InboundMessage::Publish {
            item: ItemCode::MechStatus,
            payload: Bytes::copy_from_slice(&raw.encode()),
        };

        assert!(feed(&mut session, &chunks(&publish.encode(), false), Duration::ZERO).is_empty());
        assert!(session.is_ready());
    }

    #[test]
    fn tampered_status_closes_without_decoding() {
        let (mut session, mut device) = ready_session();
        let mut frames = status_publish(&mut device, &RawMechStatus::default());
        let last = frames.len() - 1;
        let mut tampered = frames[last].to_vec();
        let end = tampered.len() - 1;
        tampered[end] ^= 0x80;
        frames[last] = Bytes::from(tampered);

        let actions = feed(&mut session, &frames, Duration::ZERO);
        assert!(!actions.iter().any(|a| matches!(a, SessionAction::StatusDecoded(_))));
        assert_eq!(actions.last(), Some(&SessionAction::Close {
            reason: CloseReason::Failed(SessionError::Authentication(
                CryptoError::AuthenticationFailed
            ))
        }));
    }

    #[test]
    fn short_status_is_frame_error() {
        let (mut session, mut device) = ready_session();
        let publish = InboundMessage::Publish {
            item: ItemCode::MechStatus,
            payload: Bytes::from_static(&[1, 2, 3]),
        };
        let frames = chunks(&device.encrypt(&publish.encode()).unwrap(), true);

        let result = session.receive(&frames[0], Duration::ZERO);
        assert!(matches!(result, Err(SessionError::Frame(_))));
        assert!(session.is_ready());
    }

    #[test]
    fn commands_are_encrypted_for_device() {
        let (mut session, mut device) = ready_session();

        let command = Command::Lock(HistoryTag::new("front door"));
        let actions = session.send(&command).unwrap();

        let mut codec = FrameCodec::default();
        let mut message = None;
        for action in actions {
            let SessionAction::Write(chunk) = action else { panic!("expected write") };
            message = codec.accept(&chunk).unwrap();
        }
        let message = message.unwrap();
        assert!(message.encrypted);
        assert_eq!(device.decrypt(&message.body).unwrap(), command.encode());
    }

    #[test]
    fn commands_rejected_unless_ready() {
        let mut session = TestSession::new(SessionConfig::default());
        let command = Command::Unlock(HistoryTag::default());

        assert_eq!(
            session.send(&command),
            Err(SessionError::CommandRejected { state: SessionState::Idle })
        );
        session.open(identity()).unwrap();
        assert_eq!(
            session.send(&command),
            Err(SessionError::CommandRejected { state: SessionState::Connecting })
        );
    }

    #[test]
    fn requested_close() {
        let (mut session, _device) = ready_session();

        assert_eq!(session.close(), vec![SessionAction::Disconnect]);
        assert_eq!(session.state(), SessionState::Closing);
        assert!(session.close().is_empty());

        assert_eq!(session.finish_close(), vec![SessionAction::Close {
            reason: CloseReason::Requested
        }]);
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.address().is_none());
    }

    #[test]
    fn link_loss_while_ready_fails() {
        let (mut session, _device) = ready_session();
        let actions = session.transport_failed("link lost");

        assert_eq!(actions.last(), Some(&SessionAction::Close {
            reason: CloseReason::Failed(SessionError::Transport("link lost".to_string()))
        }));
        assert!(session.transport_failed("again").is_empty());
    }

    #[test]
    fn connect_failure_has_no_disconnect() {
        let mut session = TestSession::new(SessionConfig::default());
        session.open(identity()).unwrap();

        let actions = session.transport_failed("timeout");
        assert_eq!(actions, vec![SessionAction::Close {
            reason: CloseReason::Failed(SessionError::Transport("timeout".to_string()))
        }]);
    }

    #[test]
    fn unusable_write_size_disconnects_link() {
        let mut session = TestSession::new(SessionConfig::default());
        session.open(identity()).unwrap();

        let actions = session.transport_connected(1, Duration::ZERO).unwrap();
        assert_eq!(actions, vec![
            SessionAction::Disconnect,
            SessionAction::Close {
                reason: CloseReason::Failed(SessionError::Frame(
                    ssm_proto::ProtocolError::InvalidWriteSize(1)
                )),
            },
        ]);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn reopen_after_close_starts_fresh() {
        let (mut session, _device) = ready_session();
        session.transport_failed("link lost");

        assert!(session.open(identity()).is_ok());
        assert_eq!(session.login_timestamp(), None);
        assert!(matches!(
            session.open(identity()),
            Err(SessionError::InvalidState { operation: "open", .. })
        ));
    }

    #[test]
    fn notifications_ignored_when_not_connected() {
        let mut session = TestSession::new(SessionConfig::default());
        assert!(session.receive(&initial()[0], Duration::ZERO).unwrap().is_empty());
    }
}
