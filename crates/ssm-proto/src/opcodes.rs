//! Op, item, and result codes.

/// First byte of every inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Reply to a command: `op | item | result | payload`
    Response = 0x07,
    /// Unsolicited notification: `op | item | payload`
    Publish = 0x08,
}

impl OpCode {
    /// Parse a raw op code. `None` if unrecognized.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x07 => Some(Self::Response),
            0x08 => Some(Self::Publish),
            _ => None,
        }
    }

    /// Raw wire value.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Identifies what a command or notification is about.
///
/// Unknown values are preserved in [`ItemCode::Other`] so that newer
/// firmware does not break parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemCode {
    /// No operation
    None,
    /// Device registration
    Registration,
    /// Login handshake
    Login,
    /// User management
    User,
    /// History retrieval
    History,
    /// Firmware version details
    VersionDetail,
    /// Disconnect and reboot
    DisconnectRebootNow,
    /// Enter firmware update mode
    EnableDfu,
    /// Clock synchronization
    Time,
    /// Session start: carries the peripheral's random code
    Initial,
    /// Magnet sensor
    Magnet,
    /// Lock/unlock angle configuration
    MechSetting,
    /// Mechanical status
    MechStatus,
    /// Lock command
    Lock,
    /// Unlock command
    Unlock,
    /// Auto-lock timer
    TimerSetting,
    /// Any other value
    Other(u8),
}

impl ItemCode {
    /// Parse a raw item code.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Registration,
            2 => Self::Login,
            3 => Self::User,
            4 => Self::History,
            5 => Self::VersionDetail,
            6 => Self::DisconnectRebootNow,
            7 => Self::EnableDfu,
            8 => Self::Time,
            14 => Self::Initial,
            17 => Self::Magnet,
            80 => Self::MechSetting,
            81 => Self::MechStatus,
            82 => Self::Lock,
            83 => Self::Unlock,
            92 => Self::TimerSetting,
            other => Self::Other(other),
        }
    }

    /// Raw wire value.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Registration => 1,
            Self::Login => 2,
            Self::User => 3,
            Self::History => 4,
            Self::VersionDetail => 5,
            Self::DisconnectRebootNow => 6,
            Self::EnableDfu => 7,
            Self::Time => 8,
            Self::Initial => 14,
            Self::Magnet => 17,
            Self::MechSetting => 80,
            Self::MechStatus => 81,
            Self::Lock => 82,
            Self::Unlock => 83,
            Self::TimerSetting => 92,
            Self::Other(value) => value,
        }
    }
}

/// Result byte of a [`OpCode::Response`] message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultCode(pub u8);

impl ResultCode {
    /// Command succeeded
    pub const SUCCESS: Self = Self(0);

    /// True if the peripheral accepted the command.
    #[must_use]
    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}
