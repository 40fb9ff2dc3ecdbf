//! # Error Types
//!
//! Custom error types for XBee Telemetry using `thiserror`.

use thiserror::Error;

/// Main error type for XBee Telemetry
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Malformed 64-bit device address
    #[error("Invalid device address: {0}")]
    InvalidAddress(String),

    /// Invalid user-supplied value (command line, programmer settings)
    #[error("Invalid value: {0}")]
    Validation(String),

    /// XBee API frame errors
    #[error("XBee protocol error: {0}")]
    Protocol(String),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("No XBee device found (tried: {0})")]
    SerialPortNotFound(String),

    /// A synchronous AT command did not receive a response in time
    #[error("Timed out waiting for {0} response")]
    Timeout(String),

    /// The radio rejected an AT command
    #[error("Command {command} failed with status {status}")]
    CommandFailed {
        /// Two-character AT command
        command: String,
        /// Status reported by the radio
        status: String,
    },

    /// Device absent from a loaded snapshot
    #[error("No samples found for {0}")]
    NotFound(String),

    /// Snapshot file missing
    #[error("Snapshot file not found: {0}")]
    SnapshotNotFound(String),

    /// Snapshot file exists but cannot be parsed
    #[error("Malformed snapshot: {0}")]
    SnapshotFormat(#[from] serde_json::Error),

    /// Snapshot write failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Sensor read from a pin that is not sampled as analog
    #[error("AD{pin} on {address} is not configured as an analog input")]
    ChannelDisabled {
        /// Analog pin number
        pin: u8,
        /// Canonical address of the node
        address: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TelemetryError {
    /// True for errors a query-side caller should report as "no data yet"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TelemetryError::NotFound(_)
                | TelemetryError::SnapshotNotFound(_)
                | TelemetryError::SnapshotFormat(_)
        )
    }

    /// True for errors that end the current radio session
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            TelemetryError::Serial(_)
                | TelemetryError::SerialPortNotFound(_)
                | TelemetryError::Timeout(_)
                | TelemetryError::Io(_)
        )
    }
}

/// Result type alias for XBee Telemetry
pub type Result<T> = std::result::Result<T, TelemetryError>;
