//! # Sensors Module
//!
//! Derived quantities for the analog sensors wired to the nodes.

pub mod conversions;
pub mod node;

pub use conversions::{AttoPilot, Adc, XBEE_ADC};
pub use node::{NodeReading, SensorLayout};
