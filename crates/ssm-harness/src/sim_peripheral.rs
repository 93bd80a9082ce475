//! Device side of the protocol.
//!
//! Speaks the same segment layer and session crypto as a real lock: publishes
//! its random code on connect, checks the login token, answers with an
//! encrypted login response, and executes lock/unlock commands.

use bytes::Bytes;
use ssm_crypto::{SessionCipher, derive_session_token};
use ssm_proto::{
    Command, FrameCodec, InboundMessage, ItemCode, LoginAck, LoginRequest, RawMechStatus,
    Response, ResultCode,
};
use tracing::{debug, warn};

/// Result code a real lock sends for a bad login.
pub const LOGIN_REJECTED: u8 = 1;

/// How the simulated lock behaves.
#[derive(Debug, Clone)]
pub struct PeripheralBehavior {
    /// Publish the random code when a link comes up
    pub send_initial: bool,
    /// Answer login requests
    pub answer_login: bool,
    /// Result code for a login with a valid token
    pub login_result: u8,
    /// Clock value in the login response
    pub clock: u32,
    /// Publish the current status right after a successful login
    pub publish_status_on_login: bool,
}

impl Default for PeripheralBehavior {
    fn default() -> Self {
        Self {
            send_initial: true,
            answer_login: true,
            login_result: ResultCode::SUCCESS.0,
            clock: 1_704_067_200,
            publish_status_on_login: false,
        }
    }
}

/// Simulated lock.
#[derive(Debug)]
pub struct SimPeripheral {
    secret: [u8; 16],
    behavior: PeripheralBehavior,
    codec: FrameCodec,
    random_code: [u8; 4],
    cipher: Option<SessionCipher>,
    status: RawMechStatus,
    commands: Vec<Command>,
}

impl SimPeripheral {
    /// Lock registered with `secret`.
    pub fn new(secret: [u8; 16]) -> Self {
        Self {
            secret,
            behavior: PeripheralBehavior::default(),
            codec: FrameCodec::default(),
            random_code: [0; 4],
            cipher: None,
            status: RawMechStatus::default(),
            commands: Vec::new(),
        }
    }

    /// Adjust behavior.
    pub fn behavior_mut(&mut self) -> &mut PeripheralBehavior {
        &mut self.behavior
    }

    /// Current mechanical status.
    pub fn status(&self) -> RawMechStatus {
        self.status
    }

    /// Replace the mechanical status.
    pub fn set_status(&mut self, status: RawMechStatus) {
        self.status = status;
    }

    /// Commands executed so far, across links.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// True after a successful login on the current link.
    pub fn is_logged_in(&self) -> bool {
        self.cipher.is_some()
    }

    /// A link came up. Returns notifications to deliver.
    pub fn connect(&mut self, random_code: [u8; 4]) -> Vec<Bytes> {
        self.disconnect();
        self.random_code = random_code;

        if !self.behavior.send_initial {
            return Vec::new();
        }

        let initial = InboundMessage::Publish {
            item: ItemCode::Initial,
            payload: Bytes::copy_from_slice(&random_code),
        };
        self.codec.fragment(&initial.encode(), false).unwrap_or_default()
    }

    /// The link went down.
    pub fn disconnect(&mut self) {
        self.cipher = None;
        self.codec.reset();
    }

    /// A chunk arrived on the write characteristic. Returns notifications.
    pub fn write(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        let message = match self.codec.accept(chunk) {
            Ok(Some(message)) => message,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(error = %err, "peripheral dropped segment");
                return Vec::new();
            },
        };

        if !message.encrypted {
            return self.login(&message.body);
        }

        let Some(cipher) = self.cipher.as_mut() else {
            warn!("encrypted write before login");
            return Vec::new();
        };
        let Ok(plaintext) = cipher.decrypt(&message.body) else {
            warn!("command failed authentication");
            return Vec::new();
        };

        match Command::decode(&plaintext) {
            Ok(command) => self.execute(command),
            Err(err) => {
                warn!(error = %err, "undecodable command");
                Vec::new()
            },
        }
    }

    /// Encrypted MECH_STATUS publish of the current status. Empty unless
    /// logged in.
    pub fn publish_status(&mut self) -> Vec<Bytes> {
        let publish = InboundMessage::Publish {
            item: ItemCode::MechStatus,
            payload: Bytes::copy_from_slice(&self.status.encode()),
        };
        match self.cipher.as_mut() {
            Some(cipher) => seal(cipher, &self.codec, &publish),
            None => Vec::new(),
        }
    }

    /// Status publish with its authentication tag corrupted.
    pub fn tampered_status(&mut self) -> Vec<Bytes> {
        let mut chunks = self.publish_status();
        if let Some(last) = chunks.pop() {
            let mut bytes = last.to_vec();
            if let Some(byte) = bytes.last_mut() {
                *byte ^= 0x01;
            }
            chunks.push(Bytes::from(bytes));
        }
        chunks
    }

    fn login(&mut self, body: &[u8]) -> Vec<Bytes> {
        let Ok(request) = LoginRequest::decode(body) else {
            debug!("ignoring plaintext write");
            return Vec::new();
        };
        if !self.behavior.answer_login {
            return Vec::new();
        }

        let Ok(token) = derive_session_token(&self.secret, &self.random_code) else {
            return Vec::new();
        };
        let valid = request.token_prefix == token.login_prefix();
        let mut cipher = SessionCipher::new(token, self.random_code);

        let result = if valid { self.behavior.login_result } else { LOGIN_REJECTED };
        let response = InboundMessage::Response(Response {
            item: ItemCode::Login,
            result: ResultCode(result),
            payload: LoginAck { timestamp: self.behavior.clock }.encode(),
        });
        let mut out = seal(&mut cipher, &self.codec, &response);

        if valid && result == ResultCode::SUCCESS.0 {
            self.cipher = Some(cipher);
            if self.behavior.publish_status_on_login {
                out.extend(self.publish_status());
            }
        }
        out
    }

    fn execute(&mut self, command: Command) -> Vec<Bytes> {
        let locking = matches!(command, Command::Lock(_));
        self.status.is_lock_range = locking;
        self.status.is_unlock_range = !locking;

        let response = InboundMessage::Response(Response {
            item: command.item(),
            result: ResultCode::SUCCESS,
            payload: Bytes::new(),
        });
        self.commands.push(command);

        let mut out = match self.cipher.as_mut() {
            Some(cipher) => seal(cipher, &self.codec, &response),
            None => Vec::new(),
        };
        out.extend(self.publish_status());
        out
    }
}

fn seal(cipher: &mut SessionCipher, codec: &FrameCodec, message: &InboundMessage) -> Vec<Bytes> {
    let Ok(sealed) = cipher.encrypt(&message.encode()) else {
        return Vec::new();
    };
    codec.fragment(&sealed, true).unwrap_or_default()
}
