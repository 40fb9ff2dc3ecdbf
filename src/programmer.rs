//! # Radio Programmer
//!
//! One-shot configuration of a sensor node radio over its local serial port:
//! API mode 2, network id, node identifier, AD0-AD4 as analog inputs, pull-ups
//! off and the periodic sample rate. Settings only survive a power cycle if
//! they are written to flash (`WR`).

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{Result, TelemetryError};
use crate::serial::port_trait::SerialPortIO;
use crate::serial::XBeeSerial;
use crate::xbee::protocol::{ApiMode, AtCommand, AT_NODE_IDENTIFIER};

/// Highest network (PAN) id accepted by ZigBee radios
pub const MAX_PAN_ID: u32 = 0x7FFF;

/// Highest IO sample rate in milliseconds
pub const MAX_SAMPLE_RATE: u32 = 0xFFFF;

/// Longest node identifier the radio stores
pub const MAX_NODE_IDENTIFIER_LEN: usize = 20;

/// ADC input mode for `D0`-`D4`
const ANALOG_INPUT: u32 = 2;

const AP: AtCommand = AtCommand::from_bytes(*b"AP");
const HV: AtCommand = AtCommand::from_bytes(*b"HV");
const VR: AtCommand = AtCommand::from_bytes(*b"VR");
const ID: AtCommand = AtCommand::from_bytes(*b"ID");
const PR: AtCommand = AtCommand::from_bytes(*b"PR");
const IR: AtCommand = AtCommand::from_bytes(*b"IR");
const WR: AtCommand = AtCommand::from_bytes(*b"WR");
const ANALOG_PINS: [AtCommand; 5] = [
    AtCommand::from_bytes(*b"D0"),
    AtCommand::from_bytes(*b"D1"),
    AtCommand::from_bytes(*b"D2"),
    AtCommand::from_bytes(*b"D3"),
    AtCommand::from_bytes(*b"D4"),
];

/// Synchronous AT command channel to a radio
#[async_trait]
pub trait CommandLink: Send {
    /// Run `command` and return the response value
    async fn command(&mut self, command: AtCommand, param: &[u8]) -> Result<Vec<u8>>;

    /// Framing to use from the next command on
    fn set_api_mode(&mut self, mode: ApiMode);
}

#[async_trait]
impl<P: SerialPortIO> CommandLink for XBeeSerial<P> {
    async fn command(&mut self, command: AtCommand, param: &[u8]) -> Result<Vec<u8>> {
        self.send_command(command, param).await
    }

    fn set_api_mode(&mut self, mode: ApiMode) {
        self.set_mode(mode);
    }
}

/// Validated programmer input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSettings {
    pan_id: String,
    node_name: String,
    sample_rate: String,
    write: bool,
}

impl NodeSettings {
    /// # Arguments
    ///
    /// * `pan_id` - Network id, hex 0-7FFF
    /// * `node_name` - Node identifier, printable ASCII, at most 20 characters
    /// * `sample_rate` - Sample period in ms, hex 0-FFFF
    /// * `write` - Persist settings to flash
    ///
    /// # Errors
    ///
    /// Returns `Validation` if any value is out of range
    pub fn new(pan_id: &str, node_name: &str, sample_rate: &str, write: bool) -> Result<Self> {
        parse_hex_in_range("network id", pan_id, MAX_PAN_ID)?;
        parse_hex_in_range("sample rate", sample_rate, MAX_SAMPLE_RATE)?;
        encode_ascii(node_name)?;

        Ok(Self {
            pan_id: pan_id.trim().to_string(),
            node_name: node_name.to_string(),
            sample_rate: sample_rate.trim().to_string(),
            write,
        })
    }

    /// Commands in the order they are sent
    pub fn commands(&self) -> Result<Vec<(AtCommand, Vec<u8>)>> {
        let mut commands = vec![
            (ID, encode_hex(&self.pan_id)?),
            (AT_NODE_IDENTIFIER, encode_ascii(&self.node_name)?),
        ];
        commands.extend(ANALOG_PINS.iter().map(|&pin| (pin, encode_int(ANALOG_INPUT))));
        commands.push((PR, encode_int(0)));
        commands.push((IR, encode_hex(&self.sample_rate)?));
        if self.write {
            commands.push((WR, Vec::new()));
        }
        Ok(commands)
    }
}

/// Version registers read before programming
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioInfo {
    pub hardware_version: Vec<u8>,
    pub firmware_version: Vec<u8>,
}

impl RadioInfo {
    pub fn hardware_hex(&self) -> String {
        to_hex(&self.hardware_version)
    }

    pub fn firmware_hex(&self) -> String {
        to_hex(&self.firmware_version)
    }
}

/// Runs the configuration sequence against one radio
#[derive(Debug)]
pub struct XBeeProgrammer<L> {
    link: L,
}

impl<L: CommandLink> XBeeProgrammer<L> {
    pub fn new(link: L) -> Self {
        Self { link }
    }

    /// Configure the radio
    ///
    /// Stops at the first command the radio rejects; settings applied before
    /// it stay in effect until the radio is reset.
    pub async fn program(&mut self, settings: &NodeSettings) -> Result<RadioInfo> {
        self.link.command(AP, &encode_int(2)).await?;
        // The radio answers AP itself in the old mode and escapes from here on
        self.link.set_api_mode(ApiMode::Escaped);

        let info = RadioInfo {
            hardware_version: self.link.command(HV, &[]).await?,
            firmware_version: self.link.command(VR, &[]).await?,
        };
        info!("hardware: {}, firmware: {}", info.hardware_hex(), info.firmware_hex());

        for (command, param) in settings.commands()? {
            debug!("Setting {} = {}", command, to_hex(&param));
            self.link.command(command, &param).await?;
        }

        if settings.write {
            info!("Settings written to flash");
        } else {
            info!("Settings applied (not written to flash)");
        }
        Ok(info)
    }

    pub fn into_inner(self) -> L {
        self.link
    }
}

/// Integer parameter as minimal big-endian bytes (zero is one byte)
pub fn encode_int(value: u32) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    bytes[first..].to_vec()
}

/// Hex string parameter as byte pairs, left-padded to an even length
pub fn encode_hex(value: &str) -> Result<Vec<u8>> {
    let digits = value.trim();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(TelemetryError::Validation(format!("{:?} is not a hex value", value)));
    }

    let padded = if digits.len() % 2 == 1 {
        format!("0{}", digits)
    } else {
        digits.to_string()
    };

    padded
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair)
                .map_err(|e| TelemetryError::Validation(e.to_string()))?;
            u8::from_str_radix(pair, 16).map_err(|e| TelemetryError::Validation(e.to_string()))
        })
        .collect()
}

/// Node identifier as ASCII bytes
pub fn encode_ascii(value: &str) -> Result<Vec<u8>> {
    if value.len() > MAX_NODE_IDENTIFIER_LEN {
        return Err(TelemetryError::Validation(format!(
            "node name {:?} is longer than {} characters",
            value, MAX_NODE_IDENTIFIER_LEN
        )));
    }
    if !value.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
        return Err(TelemetryError::Validation(format!(
            "node name {:?} must be printable ASCII",
            value
        )));
    }
    Ok(value.as_bytes().to_vec())
}

fn parse_hex_in_range(what: &str, value: &str, max: u32) -> Result<u32> {
    let parsed = u32::from_str_radix(value.trim(), 16).map_err(|_| {
        TelemetryError::Validation(format!("invalid {} {:?} (0-{:X})", what, value, max))
    })?;
    if parsed > max {
        return Err(TelemetryError::Validation(format!(
            "invalid {} {:?} (0-{:X})",
            what, value, max
        )));
    }
    Ok(parsed)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
