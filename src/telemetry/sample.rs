//! Captured measurements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::address::DeviceAddress;

/// Name carried by a sample until its node identifier resolves
pub const UNKNOWN_NODE_NAME: &str = "Unknown";

/// Raw digital and analog channels from one IO sample packet
///
/// Values are stored exactly as received so derived quantities can be
/// recomputed by any reader of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChannelData {
    /// Bit N set when DION is sampled
    pub digital_mask: u16,

    /// Bit N set when ADN is sampled
    pub analog_mask: u8,

    /// Digital line states, present when any digital channel is sampled
    pub digital_values: Option<u16>,

    /// `(pin, raw ADC count)` in ascending pin order
    pub analog_values: Vec<(u8, u16)>,
}

impl ChannelData {
    pub fn new(
        digital_mask: u16,
        analog_mask: u8,
        digital_values: Option<u16>,
        analog_values: Vec<(u8, u16)>,
    ) -> Self {
        Self {
            digital_mask,
            analog_mask,
            digital_values,
            analog_values,
        }
    }

    pub fn is_analog_enabled(&self, pin: u8) -> bool {
        pin < 8 && self.analog_mask & (1 << pin) != 0
    }

    pub fn is_digital_enabled(&self, pin: u8) -> bool {
        pin < 16 && self.digital_mask & (1 << pin) != 0
    }

    /// Raw ADC count for `pin`, if sampled
    pub fn analog(&self, pin: u8) -> Option<u16> {
        if !self.is_analog_enabled(pin) {
            return None;
        }
        self.analog_values
            .iter()
            .find(|(p, _)| *p == pin)
            .map(|&(_, raw)| raw)
    }

    /// Line state of DIO`pin`, if sampled
    pub fn digital(&self, pin: u8) -> Option<bool> {
        if !self.is_digital_enabled(pin) {
            return None;
        }
        self.digital_values.map(|values| values & (1 << pin) != 0)
    }

    pub fn digital_values(&self) -> Option<u16> {
        self.digital_values
    }
}

/// One reading captured from a device
///
/// Everything except the node name is fixed at capture time. The name is
/// replaced through [`Sample::with_node_name`], which the cache uses both to
/// carry a known name forward and to apply a resolved one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    address: DeviceAddress,
    captured_at: DateTime<Utc>,
    channels: ChannelData,
    node_name: String,
}

impl Sample {
    /// Capture a packet received now
    pub fn capture(address: DeviceAddress, channels: ChannelData) -> Self {
        Self::new(address, Utc::now(), channels)
    }

    pub fn new(address: DeviceAddress, captured_at: DateTime<Utc>, channels: ChannelData) -> Self {
        Self {
            address,
            captured_at,
            channels,
            node_name: UNKNOWN_NODE_NAME.to_string(),
        }
    }

    pub fn with_node_name(mut self, name: impl Into<String>) -> Self {
        self.node_name = name.into();
        self
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Wall-clock time this process received the packet
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn channels(&self) -> &ChannelData {
        &self.channels
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn is_named(&self) -> bool {
        self.node_name != UNKNOWN_NODE_NAME
    }
}
