//! Custom error types for gnssmux.
//!
//! This module defines structured error types for the stream splitter and the
//! UBX configuration transport. Each variant carries enough context to decide
//! whether the failure is terminal (channel gone) or recoverable (retry the
//! call).

use std::io;
use thiserror::Error;

/// Main error type for gnssmux operations.
#[derive(Error, Debug)]
pub enum MuxError {
    /// The physical channel is closed: the reader or writer loop terminated
    /// after an I/O failure or EOF, or the hub was shut down. Terminal for
    /// this demux/mux pair; reconnect policy lives with the caller.
    #[error("physical channel closed")]
    ChannelClosed,

    /// A read or a configuration round trip exceeded its allotted wait.
    /// Recoverable; the caller decides retry policy.
    #[error("operation timed out")]
    Timeout,

    /// The configuration transport received a frame that was not the
    /// expected response or acknowledgment (including ACK-NAK).
    #[error("unexpected frame: expected {expected}, got {got}")]
    UnexpectedFrame {
        /// Identity the transport was waiting for (e.g. "ACK-ACK")
        expected: &'static str,
        /// Identity of the frame actually read
        got: String,
    },

    /// A geodetic value cannot be represented in the two-part
    /// coarse + high-precision encoding within tolerance.
    #[error("value {value} exceeds split-encoding precision (residual {residual} units)")]
    Precision {
        /// The rejected value, in coarse units
        value: f64,
        /// Residual after encoding, in coarse units
        residual: f64,
    },

    /// A configuration key name is not present in the key database.
    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),

    /// `read_line` exceeded the configured maximum line length without
    /// seeing a terminator.
    #[error("line exceeds maximum length of {limit} bytes")]
    LineTooLong {
        /// The configured bound
        limit: usize,
    },

    /// Configuration errors (parsing, validation)
    #[error("configuration error: {0}")]
    Config(String),

    /// Serial port errors (device not found, permission denied)
    #[error("serial port error on '{device}': {source}")]
    Serial {
        /// Path to the serial device
        device: String,
        /// Underlying serial error
        #[source]
        source: tokio_serial::Error,
    },

    /// Other I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Type alias for Results that use MuxError
pub type Result<T> = std::result::Result<T, MuxError>;

impl MuxError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new serial error
    pub fn serial(device: impl Into<String>, source: tokio_serial::Error) -> Self {
        Self::Serial {
            device: device.into(),
            source,
        }
    }

    /// Create a new unexpected-frame error
    pub fn unexpected_frame(expected: &'static str, got: impl Into<String>) -> Self {
        Self::UnexpectedFrame {
            expected,
            got: got.into(),
        }
    }

    /// Create a new unknown-key error
    pub fn unknown_key(name: impl Into<String>) -> Self {
        Self::UnknownKey(name.into())
    }

    /// True if the underlying demux/mux pair is gone and the caller should
    /// rebuild it (after reopening the physical channel).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ChannelClosed)
    }
}
