//! Raw ADC counts to physical quantities.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TelemetryError};

/// Analog-to-digital converter characteristics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adc {
    /// Reference voltage in volts
    pub vref: f64,
    /// Count that corresponds to `vref`
    pub resolution: u16,
}

/// XBee ZigBee analog inputs as wired on the sensor nodes
pub const XBEE_ADC: Adc = Adc {
    vref: 3.3,
    resolution: 1023,
};

impl Adc {
    /// Voltage at the pin for a raw sample
    pub fn volts(&self, raw: u16) -> f64 {
        f64::from(raw) * self.vref / f64::from(self.resolution)
    }
}

impl Default for Adc {
    fn default() -> Self {
        XBEE_ADC
    }
}

/// TMP36 output voltage to degrees Celsius (10 mV/°C, 500 mV offset)
pub fn tmp36_celsius(volts: f64) -> f64 {
    100.0 * volts - 50.0
}

/// TMP36 output voltage to degrees Fahrenheit
pub fn tmp36_fahrenheit(volts: f64) -> f64 {
    celsius_to_fahrenheit(tmp36_celsius(volts))
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// AttoPilot voltage and current sense boards
///
/// Each board scales the measured voltage and current down to a pin voltage
/// by a fixed ratio given in millivolts per volt and millivolts per amp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttoPilot {
    /// 13.6 V / 45 A
    A45,
    /// 50 V / 90 A
    A90,
    /// 50 V / 180 A
    #[default]
    A180,
}

impl AttoPilot {
    /// Pin output per volt measured, in mV/V
    pub fn mv_per_volt(&self) -> f64 {
        match self {
            AttoPilot::A45 => 242.3,
            AttoPilot::A90 | AttoPilot::A180 => 63.69,
        }
    }

    /// Pin output per amp measured, in mV/A
    pub fn mv_per_amp(&self) -> f64 {
        match self {
            AttoPilot::A45 => 73.2,
            AttoPilot::A90 => 36.60,
            AttoPilot::A180 => 18.30,
        }
    }

    /// Measured voltage from the `V` pin voltage
    pub fn voltage(&self, pin_volts: f64) -> f64 {
        pin_volts * 1000.0 / self.mv_per_volt()
    }

    /// Measured current from the `I` pin voltage
    pub fn current(&self, pin_volts: f64) -> f64 {
        pin_volts * 1000.0 / self.mv_per_amp()
    }
}

impl fmt::Display for AttoPilot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttoPilot::A45 => write!(f, "a45"),
            AttoPilot::A90 => write!(f, "a90"),
            AttoPilot::A180 => write!(f, "a180"),
        }
    }
}

impl FromStr for AttoPilot {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a45" | "45" => Ok(AttoPilot::A45),
            "a90" | "90" => Ok(AttoPilot::A90),
            "a180" | "180" => Ok(AttoPilot::A180),
            other => Err(TelemetryError::Validation(format!(
                "unknown AttoPilot model {:?} (expected a45, a90 or a180)",
                other
            ))),
        }
    }
}
