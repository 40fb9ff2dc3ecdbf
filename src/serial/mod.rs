//! # Serial Communication Module
//!
//! Handles serial communication with the locally attached XBee radio.
//!
//! This module handles:
//! - Opening the serial port (8N1, no flow control)
//! - Reassembling inbound API frames from arbitrary read chunks
//! - Transmitting remote AT requests with a rolling frame id
//! - Synchronous local AT commands with a response timeout

pub mod port_trait;

use std::time::Duration;

use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::error::{Result, TelemetryError};
use crate::telemetry::DeviceAddress;
use crate::xbee::decoder::{decode_packet, FrameReader};
use crate::xbee::encoder::{encode_at_command, encode_remote_at_request};
use crate::xbee::protocol::{ApiMode, AtCommand, AtResponse, InboundPacket};
use port_trait::{SerialPortIO, TokioSerialPort};

/// Default XBee baud rate (factory setting)
pub const XBEE_DEFAULT_BAUD_RATE: u32 = 9600;

/// Default time to wait for a local AT command response
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Default XBee device paths to try (in order of preference)
pub const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyUSB0", // FTDI adapters on XBee explorer boards
    "/dev/ttyACM0",
];

/// Size of a single read from the port
const READ_CHUNK_SIZE: usize = 256;

/// XBee Serial Port Handler
///
/// Owns the port plus the partial-frame buffer. Generic over the port so
/// tests can substitute an in-memory stream.
pub struct XBeeSerial<P: SerialPortIO = TokioSerialPort> {
    /// Serial port handle
    port: P,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
    mode: ApiMode,
    reader: FrameReader,
    /// Last frame id handed out; zero is reserved for "no response"
    frame_id: u8,
    command_timeout: Duration,
}

impl<P: SerialPortIO> std::fmt::Debug for XBeeSerial<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XBeeSerial")
            .field("device_path", &self.device_path)
            .field("mode", &self.mode)
            .field("buffered", &self.reader.buffered())
            .finish_non_exhaustive()
    }
}

impl XBeeSerial {
    /// Open connection to the XBee radio
    ///
    /// # Arguments
    ///
    /// * `path` - Device path, or `"auto"` to probe `DEFAULT_DEVICE_PATHS`
    /// * `baud_rate` - Must match the radio's `BD` setting
    /// * `mode` - API framing mode configured on the radio (`AP`)
    ///
    /// # Errors
    ///
    /// Returns `Serial` if the given path cannot be opened, or
    /// `SerialPortNotFound` if no default path could be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use xbee_telemetry::serial::XBeeSerial;
    /// use xbee_telemetry::xbee::protocol::ApiMode;
    ///
    /// fn main() -> anyhow::Result<()> {
    ///     let serial = XBeeSerial::open("/dev/ttyUSB0", 9600, ApiMode::Escaped)?;
    ///     println!("Connected to: {}", serial.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(path: &str, baud_rate: u32, mode: ApiMode) -> Result<Self> {
        if path == "auto" {
            return Self::open_with_paths(DEFAULT_DEVICE_PATHS, baud_rate, mode);
        }

        let port = Self::open_port(path, baud_rate)?;
        info!("Opened XBee device at {} ({} baud)", path, baud_rate);
        Ok(Self::with_port(TokioSerialPort::new(port), path, mode))
    }

    /// Open the first device path that succeeds
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try (e.g., &["/dev/ttyUSB0"])
    pub fn open_with_paths(paths: &[&str], baud_rate: u32, mode: ApiMode) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Successfully opened XBee device at {}", path);
                    return Ok(Self::with_port(TokioSerialPort::new(port), *path, mode));
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(TelemetryError::SerialPortNotFound(paths.join(", ")))
    }

    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| TelemetryError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }
}

impl<P: SerialPortIO> XBeeSerial<P> {
    /// Wrap an already opened port
    pub fn with_port(port: P, device_path: impl Into<String>, mode: ApiMode) -> Self {
        Self {
            port,
            device_path: device_path.into(),
            mode,
            reader: FrameReader::new(mode),
            frame_id: 0,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Change how long `send_command` waits for its response
    pub fn set_command_timeout(&mut self, timeout: Duration) {
        self.command_timeout = timeout;
    }

    pub fn mode(&self) -> ApiMode {
        self.mode
    }

    /// Switch framing after the radio's `AP` setting changed
    ///
    /// Bytes buffered under the old mode are discarded.
    pub fn set_mode(&mut self, mode: ApiMode) {
        if self.reader.buffered() > 0 {
            debug!("Dropping {} buffered bytes on mode change", self.reader.buffered());
        }
        self.mode = mode;
        self.reader = FrameReader::new(mode);
    }

    /// Write one complete, already encoded API frame
    pub async fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.port
            .write_all(frame)
            .await
            .map_err(|e| TelemetryError::Serial(format!("Failed to write frame: {}", e)))?;

        self.port
            .flush()
            .await
            .map_err(|e| TelemetryError::Serial(format!("Failed to flush serial port: {}", e)))?;

        debug!("Sent XBee frame ({} bytes)", frame.len());
        Ok(())
    }

    /// Read until the next well-formed packet arrives
    ///
    /// Frames that fail the checksum or cannot be decoded are logged and
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns `Serial` if the read fails or the port reaches end of stream
    pub async fn read_packet(&mut self) -> Result<InboundPacket> {
        let mut buf = [0u8; READ_CHUNK_SIZE];

        loop {
            while let Some(result) = self.reader.next_frame() {
                match result.and_then(|frame| decode_packet(&frame)) {
                    Ok(packet) => return Ok(packet),
                    Err(e) => warn!("Discarding frame from {}: {}", self.device_path, e),
                }
            }

            let n = self
                .port
                .read(&mut buf)
                .await
                .map_err(|e| TelemetryError::Serial(format!("Failed to read: {}", e)))?;
            if n == 0 {
                return Err(TelemetryError::Serial(format!("{} closed", self.device_path)));
            }
            self.reader.push(&buf[..n]);
        }
    }

    /// Send a remote AT command without waiting for its response
    ///
    /// # Returns
    ///
    /// * `Result<u8>` - Frame id the response will carry
    pub async fn send_remote_request(
        &mut self,
        destination: &DeviceAddress,
        command: AtCommand,
        param: &[u8],
    ) -> Result<u8> {
        let frame_id = self.next_frame_id();
        let frame = encode_remote_at_request(frame_id, destination, command, param, self.mode);
        self.send_frame(&frame).await?;

        debug!("Requested {} from {} (frame {})", command, destination, frame_id);
        Ok(frame_id)
    }

    /// Run a local AT command and wait for the radio's answer
    ///
    /// Packets that are not the matching response are discarded while
    /// waiting.
    ///
    /// # Returns
    ///
    /// * `Result<Vec<u8>>` - Response value (empty for set commands)
    ///
    /// # Errors
    ///
    /// - `Timeout` if no matching response arrives in time
    /// - `CommandFailed` if the radio reports a non-OK status
    pub async fn send_command(&mut self, command: AtCommand, param: &[u8]) -> Result<Vec<u8>> {
        let frame_id = self.next_frame_id();
        let frame = encode_at_command(frame_id, command, param, self.mode);
        self.send_frame(&frame).await?;

        let response = tokio::time::timeout(
            self.command_timeout,
            self.wait_for_response(frame_id, command),
        )
        .await
        .map_err(|_| TelemetryError::Timeout(command.to_string()))??;

        if !response.status.is_ok() {
            return Err(TelemetryError::CommandFailed {
                command: command.to_string(),
                status: response.status.to_string(),
            });
        }

        Ok(response.value)
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    async fn wait_for_response(&mut self, frame_id: u8, command: AtCommand) -> Result<AtResponse> {
        loop {
            match self.read_packet().await? {
                InboundPacket::AtResponse(response)
                    if response.frame_id == frame_id && response.command == command =>
                {
                    return Ok(response);
                }
                other => debug!("Ignoring {:?} while waiting for {}", other, command),
            }
        }
    }

    /// Frame ids cycle through 1..=255
    fn next_frame_id(&mut self) -> u8 {
        self.frame_id = if self.frame_id == u8::MAX { 1 } else { self.frame_id + 1 };
        self.frame_id
    }
}
