//! Pin assignment of the solar monitoring nodes.

use serde::Serialize;

use super::conversions::{tmp36_celsius, tmp36_fahrenheit, Adc, AttoPilot};
use crate::error::{Result, TelemetryError};
use crate::telemetry::Sample;

/// Which analog input carries which sensor output
///
/// The default matches the stock node wiring: TMP36 on AD0, the PV array
/// AttoPilot on AD1 (V) and AD2 (I), the battery AttoPilot on AD3 (V) and
/// AD4 (I).
#[derive(Debug, Clone, PartialEq)]
pub struct SensorLayout {
    pub adc: Adc,
    pub attopilot: AttoPilot,
    pub temperature_pin: u8,
    pub array_voltage_pin: u8,
    pub array_current_pin: u8,
    pub battery_voltage_pin: u8,
    pub battery_current_pin: u8,
}

impl Default for SensorLayout {
    fn default() -> Self {
        Self {
            adc: Adc::default(),
            attopilot: AttoPilot::default(),
            temperature_pin: 0,
            array_voltage_pin: 1,
            array_current_pin: 2,
            battery_voltage_pin: 3,
            battery_current_pin: 4,
        }
    }
}

/// Every derived quantity of one sample; `None` where the pin is not sampled
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeReading {
    pub temperature_c: Option<f64>,
    pub temperature_f: Option<f64>,
    pub array_voltage: Option<f64>,
    pub array_current: Option<f64>,
    pub battery_voltage: Option<f64>,
    pub battery_current: Option<f64>,
}

impl SensorLayout {
    pub fn with_attopilot(mut self, model: AttoPilot) -> Self {
        self.attopilot = model;
        self
    }

    /// Voltage at an analog pin
    ///
    /// # Errors
    ///
    /// Returns `ChannelDisabled` if the pin is not in the sample's analog mask
    pub fn pin_voltage(&self, sample: &Sample, pin: u8) -> Result<f64> {
        sample
            .channels()
            .analog(pin)
            .map(|raw| self.adc.volts(raw))
            .ok_or_else(|| TelemetryError::ChannelDisabled {
                pin,
                address: sample.address().canonical_string(),
            })
    }

    pub fn temperature_c(&self, sample: &Sample) -> Result<f64> {
        self.pin_voltage(sample, self.temperature_pin).map(tmp36_celsius)
    }

    pub fn temperature_f(&self, sample: &Sample) -> Result<f64> {
        self.pin_voltage(sample, self.temperature_pin).map(tmp36_fahrenheit)
    }

    pub fn array_voltage(&self, sample: &Sample) -> Result<f64> {
        let volts = self.pin_voltage(sample, self.array_voltage_pin)?;
        Ok(self.attopilot.voltage(volts))
    }

    pub fn array_current(&self, sample: &Sample) -> Result<f64> {
        let volts = self.pin_voltage(sample, self.array_current_pin)?;
        Ok(self.attopilot.current(volts))
    }

    pub fn battery_voltage(&self, sample: &Sample) -> Result<f64> {
        let volts = self.pin_voltage(sample, self.battery_voltage_pin)?;
        Ok(self.attopilot.voltage(volts))
    }

    pub fn battery_current(&self, sample: &Sample) -> Result<f64> {
        let volts = self.pin_voltage(sample, self.battery_current_pin)?;
        Ok(self.attopilot.current(volts))
    }

    /// Derive everything the sample allows
    pub fn read(&self, sample: &Sample) -> NodeReading {
        NodeReading {
            temperature_c: self.temperature_c(sample).ok(),
            temperature_f: self.temperature_f(sample).ok(),
            array_voltage: self.array_voltage(sample).ok(),
            array_current: self.array_current(sample).ok(),
            battery_voltage: self.battery_voltage(sample).ok(),
            battery_current: self.battery_current(sample).ok(),
        }
    }
}
