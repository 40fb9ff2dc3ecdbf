//! # XBee API Frame Decoder
//!
//! Reassembles API frames from a serial byte stream and decodes the packet
//! types ingestion cares about (IO samples, AT responses).

use bytes::{Buf, BytesMut};
use tracing::{debug, warn};

use super::checksum::verify;
use super::protocol::*;
use crate::error::{Result, TelemetryError};
use crate::telemetry::{ChannelData, DeviceAddress};

/// Decode a complete, unescaped API frame
///
/// # Arguments
///
/// * `frame` - Frame bytes (delimiter, length, frame data, checksum)
///
/// # Errors
///
/// Returns error if:
/// - Frame is too short
/// - Start delimiter is incorrect
/// - Checksum verification fails
pub fn decode_frame(frame: &[u8]) -> Result<ApiFrame> {
    // Minimum frame size: delimiter(1) + length(2) + type(1) + checksum(1)
    if frame.len() < 5 {
        return Err(TelemetryError::Protocol("Frame too short".to_string()));
    }

    if frame[0] != XBEE_START_DELIMITER {
        return Err(TelemetryError::Protocol(format!(
            "Invalid start delimiter: 0x{:02X}",
            frame[0]
        )));
    }

    let length = u16::from_be_bytes([frame[1], frame[2]]) as usize;
    if length == 0 {
        return Err(TelemetryError::Protocol("Empty frame".to_string()));
    }

    if frame.len() < 3 + length + 1 {
        return Err(TelemetryError::Protocol(format!(
            "Frame too short: expected {} bytes, got {}",
            3 + length + 1,
            frame.len()
        )));
    }

    let data_with_checksum = &frame[3..3 + length + 1];
    if !verify(data_with_checksum) {
        return Err(TelemetryError::Protocol(format!(
            "Checksum mismatch (received 0x{:02X})",
            frame[3 + length]
        )));
    }

    ApiFrame::new(frame[3], frame[4..3 + length].to_vec())
}

/// Decode a frame into an inbound packet, dispatching on frame type
pub fn decode_packet(frame: &ApiFrame) -> Result<InboundPacket> {
    match frame.frame_type {
        XBEE_FRAMETYPE_IO_SAMPLE => decode_io_sample(&frame.payload).map(InboundPacket::IoSample),
        XBEE_FRAMETYPE_REMOTE_AT_RESPONSE => {
            decode_remote_at_response(&frame.payload).map(InboundPacket::RemoteAtResponse)
        }
        XBEE_FRAMETYPE_AT_RESPONSE => decode_at_response(&frame.payload).map(InboundPacket::AtResponse),
        other => Ok(InboundPacket::Other { frame_type: other }),
    }
}

/// Decode a ZigBee IO data sample payload (frame type 0x92)
///
/// Layout: addr64(8) addr16(2) options(1) sample count(1) digital mask(2)
/// analog mask(1), then the digital word when any digital channel is enabled,
/// then one 16-bit reading per enabled analog channel in pin order.
pub fn decode_io_sample(payload: &[u8]) -> Result<IoSampleFrame> {
    const HEADER_SIZE: usize = 15;

    if payload.len() < HEADER_SIZE {
        return Err(TelemetryError::Protocol(format!(
            "IO sample payload too short: {} bytes",
            payload.len()
        )));
    }

    let source = DeviceAddress::from_wire(read_address(&payload[0..8]));
    let network_address = u16::from_be_bytes([payload[8], payload[9]]);
    let receive_options = payload[10];
    let digital_mask = u16::from_be_bytes([payload[12], payload[13]]);
    let analog_mask = payload[14];

    let mut offset = HEADER_SIZE;
    let expected = offset
        + if digital_mask != 0 { 2 } else { 0 }
        + 2 * analog_mask.count_ones() as usize;
    if payload.len() < expected {
        return Err(TelemetryError::Protocol(format!(
            "IO sample payload truncated: expected {} bytes, got {}",
            expected,
            payload.len()
        )));
    }

    let digital_values = if digital_mask != 0 {
        let value = u16::from_be_bytes([payload[offset], payload[offset + 1]]);
        offset += 2;
        Some(value)
    } else {
        None
    };

    let mut analog_values = Vec::with_capacity(analog_mask.count_ones() as usize);
    for pin in 0..8u8 {
        if analog_mask & (1 << pin) != 0 {
            let raw = u16::from_be_bytes([payload[offset], payload[offset + 1]]);
            analog_values.push((pin, raw));
            offset += 2;
        }
    }

    Ok(IoSampleFrame {
        source,
        network_address,
        receive_options,
        channels: ChannelData::new(digital_mask, analog_mask, digital_values, analog_values),
    })
}

/// Decode a remote AT command response payload (frame type 0x97)
pub fn decode_remote_at_response(payload: &[u8]) -> Result<RemoteAtResponse> {
    if payload.len() < 14 {
        return Err(TelemetryError::Protocol(format!(
            "Remote AT response payload too short: {} bytes",
            payload.len()
        )));
    }

    Ok(RemoteAtResponse {
        frame_id: payload[0],
        source: DeviceAddress::from_wire(read_address(&payload[1..9])),
        network_address: u16::from_be_bytes([payload[9], payload[10]]),
        command: AtCommand::from_bytes([payload[11], payload[12]]),
        status: CommandStatus::from_u8(payload[13]),
        value: payload[14..].to_vec(),
    })
}

/// Decode a local AT command response payload (frame type 0x88)
pub fn decode_at_response(payload: &[u8]) -> Result<AtResponse> {
    if payload.len() < 4 {
        return Err(TelemetryError::Protocol(format!(
            "AT response payload too short: {} bytes",
            payload.len()
        )));
    }

    Ok(AtResponse {
        frame_id: payload[0],
        command: AtCommand::from_bytes([payload[1], payload[2]]),
        status: CommandStatus::from_u8(payload[3]),
        value: payload[4..].to_vec(),
    })
}

fn read_address(bytes: &[u8]) -> [u8; 8] {
    let mut address = [0u8; 8];
    address.copy_from_slice(&bytes[..8]);
    address
}

/// Outcome of scanning the buffer for one frame
enum Scan {
    /// More bytes are needed
    Incomplete,
    /// The frame was cut short; discard this many raw bytes and rescan
    Truncated(usize),
    /// A whole frame: raw bytes consumed and the unescaped frame
    Complete(usize, Vec<u8>),
}

/// Streaming API frame reassembler
///
/// Feed raw serial bytes with [`FrameReader::push`] and pull decoded frames
/// with [`FrameReader::next_frame`]. Garbage before a start delimiter is
/// skipped; in escaped mode a bare delimiter inside a frame marks the
/// previous frame as truncated.
#[derive(Debug)]
pub struct FrameReader {
    buf: BytesMut,
    mode: ApiMode,
}

impl FrameReader {
    pub fn new(mode: ApiMode) -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
            mode,
        }
    }

    /// Append raw bytes received from the port
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of raw bytes waiting to be framed
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Extract the next frame, if a complete one is buffered
    ///
    /// Returns `Some(Err(..))` for a complete frame that fails validation;
    /// the reader has already moved past it.
    pub fn next_frame(&mut self) -> Option<Result<ApiFrame>> {
        loop {
            let start = match self.buf.iter().position(|&b| b == XBEE_START_DELIMITER) {
                Some(start) => start,
                None => {
                    if !self.buf.is_empty() {
                        debug!("Discarding {} bytes without start delimiter", self.buf.len());
                        self.buf.clear();
                    }
                    return None;
                }
            };

            if start > 0 {
                debug!("Skipping {} bytes before start delimiter", start);
                self.buf.advance(start);
            }

            match self.scan() {
                Scan::Incomplete => return None,
                Scan::Truncated(consumed) => {
                    warn!("Dropping truncated XBee frame ({} bytes)", consumed);
                    self.buf.advance(consumed);
                }
                Scan::Complete(consumed, frame) => {
                    self.buf.advance(consumed);
                    return Some(decode_frame(&frame));
                }
            }
        }
    }

    /// Unescape from the delimiter at `buf[0]` until one full frame is read
    fn scan(&self) -> Scan {
        let mut frame = Vec::with_capacity(self.buf.len());
        frame.push(XBEE_START_DELIMITER);
        let mut escape_next = false;

        for (index, &raw) in self.buf.iter().enumerate().skip(1) {
            let byte = match self.mode {
                ApiMode::Unescaped => raw,
                ApiMode::Escaped => {
                    if raw == XBEE_START_DELIMITER {
                        return Scan::Truncated(index);
                    }
                    if raw == XBEE_ESCAPE {
                        escape_next = true;
                        continue;
                    }
                    if escape_next {
                        escape_next = false;
                        raw ^ XBEE_ESCAPE_XOR
                    } else {
                        raw
                    }
                }
            };
            frame.push(byte);

            if frame.len() >= 3 {
                let length = u16::from_be_bytes([frame[1], frame[2]]) as usize;
                if length == 0 || length > XBEE_MAX_FRAME_DATA {
                    // Not a real length field; resync after this delimiter
                    return Scan::Truncated(1);
                }
                if frame.len() == 3 + length + 1 {
                    return Scan::Complete(index + 1, frame);
                }
            }
        }

        Scan::Incomplete
    }
}
