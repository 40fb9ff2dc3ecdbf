//! # XBee API Protocol Constants and Types
//!
//! Core protocol definitions for XBee ZigBee (Series 2) API frames.

use std::fmt;

use serde::Deserialize;

use crate::error::{Result, TelemetryError};
use crate::telemetry::{ChannelData, DeviceAddress};

/// API frame start delimiter (always 0x7E)
pub const XBEE_START_DELIMITER: u8 = 0x7E;

/// Escape marker used in API mode 2
pub const XBEE_ESCAPE: u8 = 0x7D;

/// Value XOR-ed into an escaped byte
pub const XBEE_ESCAPE_XOR: u8 = 0x20;

/// Software flow control bytes, escaped in API mode 2
pub const XBEE_XON: u8 = 0x11;
pub const XBEE_XOFF: u8 = 0x13;

/// Local AT command request
pub const XBEE_FRAMETYPE_AT_COMMAND: u8 = 0x08;

/// Remote AT command request
pub const XBEE_FRAMETYPE_REMOTE_AT_REQUEST: u8 = 0x17;

/// Local AT command response
pub const XBEE_FRAMETYPE_AT_RESPONSE: u8 = 0x88;

/// ZigBee IO data sample indicator
pub const XBEE_FRAMETYPE_IO_SAMPLE: u8 = 0x92;

/// Remote AT command response
pub const XBEE_FRAMETYPE_REMOTE_AT_RESPONSE: u8 = 0x97;

/// Largest frame data accepted by the reader (type + payload)
pub const XBEE_MAX_FRAME_DATA: usize = 512;

/// 16-bit destination used when the network address is unknown
pub const XBEE_UNKNOWN_NETWORK_ADDRESS: u16 = 0xFFFE;

/// Remote AT option: apply changes on the remote radio
pub const XBEE_REMOTE_APPLY_CHANGES: u8 = 0x02;

/// Node Identifier command, used for name resolution
pub const AT_NODE_IDENTIFIER: AtCommand = AtCommand(*b"NI");

/// Framing mode configured on the attached radio (`AP` parameter)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiMode {
    /// AP=1, no escaping
    Unescaped,
    /// AP=2, control bytes escaped
    #[default]
    Escaped,
}

/// Two-character AT command name (e.g. `NI`, `ID`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtCommand([u8; 2]);

impl AtCommand {
    /// Build a command from its two-letter mnemonic
    ///
    /// # Errors
    ///
    /// Returns `Validation` unless `name` is exactly two ASCII alphanumerics
    pub fn new(name: &str) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.len() != 2 || !bytes.iter().all(|b| b.is_ascii_alphanumeric()) {
            return Err(TelemetryError::Validation(format!(
                "AT command must be two ASCII characters, got {:?}",
                name
            )));
        }
        Ok(Self([bytes[0].to_ascii_uppercase(), bytes[1].to_ascii_uppercase()]))
    }

    pub const fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> [u8; 2] {
        self.0
    }
}

impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0[0] as char, self.0[1] as char)
    }
}

/// Status byte of an AT command response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Ok,
    Error,
    InvalidCommand,
    InvalidParameter,
    TransmissionFailure,
    Unknown(u8),
}

impl CommandStatus {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => CommandStatus::Ok,
            1 => CommandStatus::Error,
            2 => CommandStatus::InvalidCommand,
            3 => CommandStatus::InvalidParameter,
            4 => CommandStatus::TransmissionFailure,
            other => CommandStatus::Unknown(other),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, CommandStatus::Ok)
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandStatus::Ok => write!(f, "ok"),
            CommandStatus::Error => write!(f, "error"),
            CommandStatus::InvalidCommand => write!(f, "invalid command"),
            CommandStatus::InvalidParameter => write!(f, "invalid parameter"),
            CommandStatus::TransmissionFailure => write!(f, "transmission failure"),
            CommandStatus::Unknown(code) => write!(f, "unknown (0x{:02X})", code),
        }
    }
}

/// Decoded API frame (frame type and the bytes that follow it)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFrame {
    /// Frame type
    pub frame_type: u8,

    /// Frame-specific data
    pub payload: Vec<u8>,
}

impl ApiFrame {
    /// Create a new API frame
    ///
    /// # Errors
    ///
    /// Returns error if type + payload exceeds `XBEE_MAX_FRAME_DATA`
    pub fn new(frame_type: u8, payload: Vec<u8>) -> Result<Self> {
        if payload.len() + 1 > XBEE_MAX_FRAME_DATA {
            return Err(TelemetryError::Protocol(format!(
                "Frame data size {} exceeds maximum {}",
                payload.len() + 1,
                XBEE_MAX_FRAME_DATA
            )));
        }

        Ok(Self {
            frame_type,
            payload,
        })
    }

    /// Length field value (type + payload)
    pub fn length(&self) -> u16 {
        (1 + self.payload.len()) as u16
    }
}

/// ZigBee IO data sample (frame type 0x92)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoSampleFrame {
    /// 64-bit address of the sampling node
    pub source: DeviceAddress,

    /// 16-bit network address of the sampling node
    pub network_address: u16,

    /// Receive options bit field
    pub receive_options: u8,

    /// Sampled digital and analog channels
    pub channels: ChannelData,
}

/// Response to a remote AT command (frame type 0x97)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAtResponse {
    pub frame_id: u8,
    pub source: DeviceAddress,
    pub network_address: u16,
    pub command: AtCommand,
    pub status: CommandStatus,
    pub value: Vec<u8>,
}

impl RemoteAtResponse {
    /// Decode the value as a node identifier string
    ///
    /// Each byte is one character code. An empty value is an empty name.
    pub fn node_identifier(&self) -> String {
        self.value.iter().map(|&b| b as char).collect()
    }
}

/// Response to a local AT command (frame type 0x88)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtResponse {
    pub frame_id: u8,
    pub command: AtCommand,
    pub status: CommandStatus,
    pub value: Vec<u8>,
}

/// Inbound packet, dispatched by frame type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundPacket {
    /// Unsolicited measurement from a node
    IoSample(IoSampleFrame),

    /// Answer to a remote request, e.g. a node identifier query
    RemoteAtResponse(RemoteAtResponse),

    /// Answer to a command sent to the attached radio
    AtResponse(AtResponse),

    /// Any other frame type; ignored by ingestion
    Other { frame_type: u8 },
}
