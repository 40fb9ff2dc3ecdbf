//! # XBee API Protocol Module
//!
//! Implementation of the XBee ZigBee API frame protocol.
//!
//! This module handles:
//! - API frame encoding with optional mode 2 escaping
//! - Stream reassembly and validation of inbound frames
//! - Decoding IO samples and AT command responses
//! - Checksum calculation

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod checksum;
