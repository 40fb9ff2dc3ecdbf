//! 64-bit device addresses.
//!
//! The canonical form is 16 uppercase hex digits, e.g. `0013A20012345678`.
//! The radio side carries the same value as eight big-endian bytes, and
//! diagnostic tools print it grouped into byte pairs (`00 13 A2 00 ...`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, TelemetryError};

/// Number of hex digits in a canonical address
pub const ADDRESS_HEX_DIGITS: usize = 16;

/// Shortest hex run accepted by [`DeviceAddress::parse_lenient`]
pub const LENIENT_MIN_HEX_DIGITS: usize = 8;

/// Identity of a node on the mesh; the only cache key
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceAddress(u64);

impl DeviceAddress {
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Parse exactly 16 hex digits (any case, surrounding whitespace ignored)
    ///
    /// # Errors
    ///
    /// Returns `InvalidAddress` for any other input.
    pub fn parse(text: &str) -> Result<Self> {
        let digits = text.trim();
        if digits.len() != ADDRESS_HEX_DIGITS || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TelemetryError::InvalidAddress(format!(
                "expected {} hex digits, got {:?}",
                ADDRESS_HEX_DIGITS, text
            )));
        }
        u64::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|e| TelemetryError::InvalidAddress(format!("{:?}: {}", text, e)))
    }

    /// Parse the way older tooling did: the input is split on whitespace,
    /// `0x` prefixes and `,`/`:` separators are removed inside each word,
    /// and the longest hex run of 8 to 16 digits in any single word is
    /// used. Shorter runs are zero-padded; on a tie the first word wins.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAddress` if no word holds such a run.
    pub fn parse_lenient(text: &str) -> Result<Self> {
        let mut best: Option<String> = None;

        for word in text.split_whitespace() {
            let stripped = strip_wire_formatting(word);
            let run = longest_hex_run(&stripped);
            if run.len() < LENIENT_MIN_HEX_DIGITS || run.len() > ADDRESS_HEX_DIGITS {
                continue;
            }
            if best.as_ref().map_or(true, |b| run.len() > b.len()) {
                best = Some(run.to_string());
            }
        }

        let run = best.ok_or_else(|| {
            TelemetryError::InvalidAddress(format!(
                "no run of {} to {} hex digits in {:?}",
                LENIENT_MIN_HEX_DIGITS, ADDRESS_HEX_DIGITS, text
            ))
        })?;
        u64::from_str_radix(&run, 16)
            .map(Self)
            .map_err(|e| TelemetryError::InvalidAddress(format!("{:?}: {}", text, e)))
    }

    /// Build from the eight big-endian bytes carried in API frames
    pub const fn from_wire(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }

    /// The eight big-endian bytes carried in API frames
    pub const fn to_wire(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Parse the byte-grouped text form (`0x00,0x13,...` or `00 13 A2 ...`)
    pub fn from_wire_string(text: &str) -> Result<Self> {
        Self::parse(&strip_wire_formatting(text))
    }

    /// Byte-grouped text form: a space after every two hex digits
    pub fn to_wire_string(&self) -> String {
        self.to_wire()
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 16 uppercase hex digits; the equality and ordering basis
    pub fn canonical_string(&self) -> String {
        format!("{:016X}", self.0)
    }
}

fn strip_wire_formatting(text: &str) -> String {
    text.replace("0x", "")
        .replace("0X", "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != ':')
        .collect()
}

fn longest_hex_run(text: &str) -> &str {
    let mut best = (0, 0);
    let mut start = None;

    for (index, c) in text.char_indices().chain(std::iter::once((text.len(), ' '))) {
        match (c.is_ascii_hexdigit(), start) {
            (true, None) => start = Some(index),
            (false, Some(s)) => {
                if index - s > best.1 - best.0 {
                    best = (s, index);
                }
                start = None;
            }
            _ => {}
        }
    }

    &text[best.0..best.1]
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

impl fmt::Debug for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceAddress({:016X})", self.0)
    }
}

impl FromStr for DeviceAddress {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for DeviceAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical_string())
    }
}

impl<'de> Deserialize<'de> for DeviceAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonicalises_case() {
        for text in ["0013a20012345678", "0013A20012345678", "ffffffffffffffff", "0000000000000000"] {
            let address = DeviceAddress::parse(text).unwrap();
            assert_eq!(address.canonical_string(), text.to_uppercase());
        }
    }

    #[test]
    fn test_parse_rejects_wrong_length_or_digits() {
        assert!(DeviceAddress::parse("0013A2001234567").is_err());
        assert!(DeviceAddress::parse("0013A200123456789").is_err());
        assert!(DeviceAddress::parse("0013A20012345G78").is_err());
        assert!(DeviceAddress::parse("").is_err());
        assert!(DeviceAddress::parse("+013A20012345678").is_err());
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let address = DeviceAddress::parse("  0013A20012345678\n").unwrap();
        assert_eq!(address.as_u64(), 0x0013A200_12345678);
    }

    #[test]
    fn test_from_str_is_strict() {
        assert!("0013A20012345678".parse::<DeviceAddress>().is_ok());
        assert!("12345678".parse::<DeviceAddress>().is_err());
    }

    #[test]
    fn test_parse_lenient_accepts_short_runs() {
        let address = DeviceAddress::parse_lenient("12345678").unwrap();
        assert_eq!(address.canonical_string(), "0000000012345678");
    }

    #[test]
    fn test_parse_lenient_strips_wire_formatting() {
        let address = DeviceAddress::parse_lenient("0x00,0x13,0xa2,0x00,0x12,0x34,0x56,0x78").unwrap();
        assert_eq!(address.canonical_string(), "0013A20012345678");

        let address = DeviceAddress::parse_lenient("unit 0013A200:12345678 (garage)").unwrap();
        assert_eq!(address.canonical_string(), "0013A20012345678");
    }

    #[test]
    fn test_parse_lenient_rejects() {
        assert!(DeviceAddress::parse_lenient("1234567").is_err());
        assert!(DeviceAddress::parse_lenient("THERMOMETER").is_err());
        assert!(DeviceAddress::parse_lenient("0013A2001234567890").is_err());
        assert!(DeviceAddress::parse_lenient("").is_err());
    }

    #[test]
    fn test_parse_lenient_keeps_words_apart() {
        let address = DeviceAddress::parse_lenient("addr=0013A20012345678 feed").unwrap();
        assert_eq!(address.canonical_string(), "0013A20012345678");

        let address = DeviceAddress::parse_lenient("cafe 12345678").unwrap();
        assert_eq!(address.canonical_string(), "0000000012345678");

        let address = DeviceAddress::parse_lenient("node 0013A200 12345678 bad").unwrap();
        assert_eq!(address.canonical_string(), "000000000013A200");

        assert!(DeviceAddress::parse_lenient("cafe babe").is_err());
    }

    #[test]
    fn test_wire_roundtrip() {
        for value in [0u64, 1, 0x0013A200_12345678, u64::MAX] {
            let address = DeviceAddress::from_u64(value);
            assert_eq!(DeviceAddress::from_wire(address.to_wire()), address);
            assert_eq!(DeviceAddress::from_wire_string(&address.to_wire_string()).unwrap(), address);
        }
    }

    #[test]
    fn test_wire_layout() {
        let address = DeviceAddress::parse("0013A20012345678").unwrap();
        assert_eq!(address.to_wire(), [0x00, 0x13, 0xA2, 0x00, 0x12, 0x34, 0x56, 0x78]);
        assert_eq!(address.to_wire_string(), "00 13 A2 00 12 34 56 78");
    }

    #[test]
    fn test_from_wire_string_formats() {
        let expected = DeviceAddress::from_u64(0x0013A200_12345678);
        assert_eq!(
            DeviceAddress::from_wire_string("0x00,0x13,0xa2,0x00,0x12,0x34,0x56,0x78").unwrap(),
            expected
        );
        assert_eq!(DeviceAddress::from_wire_string("00 13 A2 00 12 34 56 78").unwrap(), expected);
        assert!(DeviceAddress::from_wire_string("00 13 A2").is_err());
    }

    #[test]
    fn test_equality_follows_canonical_string() {
        let lower = DeviceAddress::parse("0013a20012345678").unwrap();
        let upper = DeviceAddress::parse("0013A20012345678").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.to_string(), upper.canonical_string());
    }

    #[test]
    fn test_ordering_matches_canonical_string() {
        let a = DeviceAddress::from_u64(0x0013A200_00000001);
        let b = DeviceAddress::from_u64(0x0013A200_0000000A);
        assert!(a < b);
        assert!(a.canonical_string() < b.canonical_string());
    }

    #[test]
    fn test_serde_as_canonical_string() {
        let address = DeviceAddress::from_u64(0x0013A200_12345678);
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"0013A20012345678\"");

        let back: DeviceAddress = serde_json::from_str("\"0013a20012345678\"").unwrap();
        assert_eq!(back, address);
        assert!(serde_json::from_str::<DeviceAddress>("\"bogus\"").is_err());
    }
}
