//! Protocol errors

use thiserror::Error;

use super::Command;

/// Errors that can occur during protocol communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The port could not be opened, written, read or flushed
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// Nothing arrived before the response deadline
    #[error("No response to {command:?} ({received} bytes before deadline)")]
    Timeout {
        /// Command that went unanswered
        command: Command,
        /// Bytes read before giving up
        received: usize,
    },

    /// Fewer bytes than the command's response carries
    #[error("Short response to {command:?}: expected at least {expected} bytes, got {actual}")]
    ShortResponse {
        /// Command whose response was cut short
        command: Command,
        /// Minimum length of a complete response
        expected: usize,
        /// Bytes actually received
        actual: usize,
    },

    /// GETCFG did not return exactly 256 bytes
    #[error("Malformed configuration block: expected 256 bytes, got {actual}")]
    MalformedConfig {
        /// Length of the block the device sent
        actual: usize,
    },

    /// The device clock fields do not form a calendar time
    #[error("Invalid device time: {year_offset:02}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}")]
    InvalidDateTime {
        /// Years since 2000
        year_offset: u8,
        /// Month as sent
        month: u8,
        /// Day as sent
        day: u8,
        /// Hour as sent
        hour: u8,
        /// Minute as sent
        minute: u8,
        /// Second as sent
        second: u8,
    },

    /// A host time the six-byte clock cannot represent
    #[error("Time {0} is outside the device range (2000-2255)")]
    TimeOutOfRange(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ProtocolError {
    /// Link failures: the port could not be opened, written, read or flushed
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ProtocolError::SerialError(_) | ProtocolError::IoError(_) | ProtocolError::Timeout { .. }
        )
    }

    /// Firmware mismatch: the device answered GETCFG with the wrong block size
    pub fn is_config_mismatch(&self) -> bool {
        matches!(self, ProtocolError::MalformedConfig { .. })
    }
}
