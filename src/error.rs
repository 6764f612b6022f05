//! Custom error types for the driver.
//!
//! All fallible operations in this crate return [`SquidError`] through the
//! [`Result`] alias. The taxonomy follows the failure modes of the wire
//! protocol: transport I/O is fatal to the in-progress operation and is never
//! retried internally, a missed acknowledgment is a recoverable caller-visible
//! outcome, and capabilities the firmware does not provide are reported as
//! [`SquidError::Unsupported`]. Retry policy belongs entirely to the caller.

use thiserror::Error;

/// Convenience alias for results using the driver error type.
pub type Result<T> = std::result::Result<T, SquidError>;

/// Error type for all controller operations.
#[derive(Error, Debug)]
pub enum SquidError {
    /// Write or read against the serial link failed.
    #[error("transport I/O error: {0}")]
    Transport(#[from] std::io::Error),

    /// The serial port could not be opened or configured.
    #[cfg(feature = "instrument_serial")]
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Operation requires an open connection.
    #[error("controller not connected")]
    NotConnected,

    /// A blocking wait for an acknowledgment frame expired. The command may
    /// still execute; the caller decides whether to retry.
    #[error("no acknowledgment for command {sequence} within {waited_ms} ms")]
    AckTimeout {
        /// Sequence number of the unacknowledged command.
        sequence: u8,
        /// How long the caller waited before giving up.
        waited_ms: u64,
    },

    /// An axis did not report not-busy within the allotted time.
    #[error("axis did not settle within {0} ms")]
    SettleTimeout(u64),

    /// The firmware does not implement this operation.
    #[error("operation not supported by the controller: {0}")]
    Unsupported(&'static str),

    /// Invalid or unparseable configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SquidError::AckTimeout {
            sequence: 17,
            waited_ms: 250,
        };
        assert_eq!(
            err.to_string(),
            "no acknowledgment for command 17 within 250 ms"
        );
    }

    #[test]
    fn test_unsupported_display() {
        let err = SquidError::Unsupported("stop-in-place");
        assert!(err.to_string().contains("stop-in-place"));
    }
}
