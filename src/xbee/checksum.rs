//! # XBee API Checksum
//!
//! The checksum is `0xFF` minus the low byte of the sum of all frame data
//! bytes (everything between the length field and the checksum itself).
//! A frame is valid when the frame data plus checksum sums to `0xFF`.

/// Calculate the checksum for a frame
///
/// # Arguments
///
/// * `data` - Frame data (type + payload, unescaped)
///
/// # Examples
///
/// ```no_run
/// use xbee_telemetry::xbee::checksum::checksum;
///
/// let data = [0x08, 0x01, b'N', b'I'];
/// assert_eq!(checksum(&data), 0x5F);
/// ```
pub fn checksum(data: &[u8]) -> u8 {
    0xFF - sum(data)
}

/// Verify frame data followed by its checksum byte
pub fn verify(data_with_checksum: &[u8]) -> bool {
    !data_with_checksum.is_empty() && sum(data_with_checksum) == 0xFF
}

fn sum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}
