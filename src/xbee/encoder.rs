//! # XBee API Frame Encoder
//!
//! Encodes AT command requests into complete API frames.

use super::checksum::checksum;
use super::protocol::*;
use crate::telemetry::DeviceAddress;

/// Wrap frame data into a complete API frame
///
/// # Arguments
///
/// * `frame` - Frame type and payload
/// * `mode` - Framing mode of the attached radio
///
/// # Returns
///
/// * `Vec<u8>` - Start delimiter, length, frame data and checksum, escaped
///   after the delimiter when `mode` is `ApiMode::Escaped`
pub fn encode_frame(frame: &ApiFrame, mode: ApiMode) -> Vec<u8> {
    // Length + Type + Payload + Checksum, unescaped
    let mut body = Vec::with_capacity(2 + frame.length() as usize + 1);
    body.extend_from_slice(&frame.length().to_be_bytes());
    body.push(frame.frame_type);
    body.extend_from_slice(&frame.payload);
    body.push(checksum(&body[2..]));

    let mut complete_frame = Vec::with_capacity(1 + body.len() * 2);
    complete_frame.push(XBEE_START_DELIMITER);
    match mode {
        ApiMode::Unescaped => complete_frame.extend_from_slice(&body),
        ApiMode::Escaped => escape_into(&body, &mut complete_frame),
    }

    complete_frame
}

/// Encode a local AT command (frame type 0x08)
///
/// A `frame_id` of zero tells the radio not to send a response.
///
/// # Examples
///
/// ```no_run
/// use xbee_telemetry::xbee::encoder::encode_at_command;
/// use xbee_telemetry::xbee::protocol::{ApiMode, AT_NODE_IDENTIFIER};
///
/// let frame = encode_at_command(1, AT_NODE_IDENTIFIER, &[], ApiMode::Unescaped);
/// assert_eq!(frame, vec![0x7E, 0x00, 0x04, 0x08, 0x01, 0x4E, 0x49, 0x5F]);
/// ```
pub fn encode_at_command(frame_id: u8, command: AtCommand, param: &[u8], mode: ApiMode) -> Vec<u8> {
    let mut payload = Vec::with_capacity(3 + param.len());
    payload.push(frame_id);
    payload.extend_from_slice(&command.as_bytes());
    payload.extend_from_slice(param);

    encode_frame(
        &ApiFrame {
            frame_type: XBEE_FRAMETYPE_AT_COMMAND,
            payload,
        },
        mode,
    )
}

/// Encode a remote AT command request (frame type 0x17)
///
/// The 16-bit destination is always `0xFFFE` (unknown), so the network
/// routes on the 64-bit address alone.
pub fn encode_remote_at_request(
    frame_id: u8,
    destination: &DeviceAddress,
    command: AtCommand,
    param: &[u8],
    mode: ApiMode,
) -> Vec<u8> {
    let mut payload = Vec::with_capacity(14 + param.len());
    payload.push(frame_id);
    payload.extend_from_slice(&destination.to_wire());
    payload.extend_from_slice(&XBEE_UNKNOWN_NETWORK_ADDRESS.to_be_bytes());
    payload.push(XBEE_REMOTE_APPLY_CHANGES);
    payload.extend_from_slice(&command.as_bytes());
    payload.extend_from_slice(param);

    encode_frame(
        &ApiFrame {
            frame_type: XBEE_FRAMETYPE_REMOTE_AT_REQUEST,
            payload,
        },
        mode,
    )
}

/// True if `byte` must be escaped in API mode 2
pub fn needs_escape(byte: u8) -> bool {
    matches!(byte, XBEE_START_DELIMITER | XBEE_ESCAPE | XBEE_XON | XBEE_XOFF)
}

fn escape_into(data: &[u8], out: &mut Vec<u8>) {
    for &byte in data {
        if needs_escape(byte) {
            out.push(XBEE_ESCAPE);
            out.push(byte ^ XBEE_ESCAPE_XOR);
        } else {
            out.push(byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xbee::checksum::verify;

    #[test]
    fn test_encode_at_command_reference_frame() {
        let frame = encode_at_command(1, AT_NODE_IDENTIFIER, &[], ApiMode::Unescaped);
        assert_eq!(frame, vec![0x7E, 0x00, 0x04, 0x08, 0x01, 0x4E, 0x49, 0x5F]);
    }

    #[test]
    fn test_encode_at_command_with_parameter() {
        let cmd = AtCommand::new("D0").unwrap();
        let frame = encode_at_command(2, cmd, &[0x02], ApiMode::Unescaped);

        assert_eq!(frame[0], XBEE_START_DELIMITER);
        assert_eq!(u16::from_be_bytes([frame[1], frame[2]]), 5);
        assert_eq!(frame[3], XBEE_FRAMETYPE_AT_COMMAND);
        assert_eq!(&frame[4..8], &[0x02, b'D', b'0', 0x02]);
        assert!(verify(&frame[3..]));
    }

    #[test]
    fn test_encode_remote_at_request_layout() {
        let address = DeviceAddress::from_u64(0x0013A200_40522BAA);
        let frame = encode_remote_at_request(7, &address, AT_NODE_IDENTIFIER, &[], ApiMode::Unescaped);

        // delimiter(1) + length(2) + type(1) + id(1) + addr64(8) + addr16(2) + options(1) + cmd(2) + checksum(1)
        assert_eq!(frame.len(), 19);
        assert_eq!(u16::from_be_bytes([frame[1], frame[2]]), 15);
        assert_eq!(frame[3], XBEE_FRAMETYPE_REMOTE_AT_REQUEST);
        assert_eq!(frame[4], 7);
        assert_eq!(&frame[5..13], &[0x00, 0x13, 0xA2, 0x00, 0x40, 0x52, 0x2B, 0xAA]);
        assert_eq!(&frame[13..15], &[0xFF, 0xFE]);
        assert_eq!(frame[15], XBEE_REMOTE_APPLY_CHANGES);
        assert_eq!(&frame[16..18], b"NI");
        assert!(verify(&frame[3..]));
    }

    #[test]
    fn test_escaped_mode_escapes_control_bytes() {
        // 0x13 and 0x7D inside the address must be escaped
        let address = DeviceAddress::from_u64(0x0013A200_7D11007E);
        let plain = encode_remote_at_request(1, &address, AT_NODE_IDENTIFIER, &[], ApiMode::Unescaped);
        let escaped = encode_remote_at_request(1, &address, AT_NODE_IDENTIFIER, &[], ApiMode::Escaped);

        assert!(escaped.len() > plain.len());
        assert_eq!(escaped[0], XBEE_START_DELIMITER);
        // only the leading delimiter may appear unescaped
        assert!(!escaped[1..].contains(&XBEE_START_DELIMITER));
        assert!(!escaped[1..].contains(&XBEE_XON));
        assert!(!escaped[1..].contains(&XBEE_XOFF));
    }

    #[test]
    fn test_escaped_mode_is_identity_without_control_bytes() {
        let frame = encode_at_command(1, AT_NODE_IDENTIFIER, &[], ApiMode::Escaped);
        assert_eq!(frame, encode_at_command(1, AT_NODE_IDENTIFIER, &[], ApiMode::Unescaped));
    }

    #[test]
    fn test_needs_escape() {
        for byte in [0x7E, 0x7D, 0x11, 0x13] {
            assert!(needs_escape(byte));
        }
        assert!(!needs_escape(0x00));
        assert!(!needs_escape(0x92));
    }
}
