//! # XBee Telemetry Library
//!
//! Collect IO samples from an XBee ZigBee sensor mesh and keep the latest
//! sample per node.
//!
//! This library provides the API frame codec, the serial link to the local
//! radio, the per-device sample cache with node name resolution, snapshot
//! persistence for other processes, and sensor conversions for the solar
//! monitoring nodes.

pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod programmer;
pub mod sensors;
pub mod serial;
pub mod telemetry;
pub mod xbee;
