use crate::answers::{DeviceError, StatusCode};
use std::fmt;
use std::io;

/// Transport level failures. These are surfaced immediately and never retried.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// The stream ended before the requested number of bytes arrived.
    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },

    /// No data arrived before the read deadline.
    #[error("read timed out")]
    Timeout,

    /// The channel was closed.
    #[error("channel closed")]
    Closed,

    /// Any other error reported by the underlying stream (e.g., serial port).
    #[error("io error: {0}")]
    Other(io::Error),
}

impl From<io::Error> for IoError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => IoError::Timeout,
            io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected => IoError::Closed,
            _ => IoError::Other(err),
        }
    }
}

/// Where in a reply a checksum mismatch was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultLocation {
    StatusLine,
    TimeLine,
    TimestampLine,
    /// Zero based index of the `KEY:value;sum` line in an info reply.
    InfoLine(usize),
    /// Zero based index of the data block; the partial block has the last index.
    Block(usize),
}

impl fmt::Display for FaultLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultLocation::StatusLine => write!(f, "status line"),
            FaultLocation::TimeLine => write!(f, "time line"),
            FaultLocation::TimestampLine => write!(f, "timestamp line"),
            FaultLocation::InfoLine(i) => write!(f, "info line {}", i),
            FaultLocation::Block(i) => write!(f, "block {}", i),
        }
    }
}

/// A fault in the framing or content of a reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolFault {
    /// The sum byte does not match the covered span.
    #[error("checksum mismatch at {at}: expected {expected:#04x}, received {received:#04x}")]
    ChecksumMismatch {
        at: FaultLocation,
        expected: u8,
        received: u8,
    },

    /// A line had the wrong length, a missing terminator or an unparsable field.
    #[error("malformed {field}: {description}")]
    MalformedField {
        field: &'static str,
        description: String,
    },

    /// The echoed command symbol is unknown or not the one that was sent.
    #[error("unexpected command symbol {symbol:?}")]
    UnexpectedSymbol { symbol: String },
}

impl ProtocolFault {
    pub(crate) fn malformed(field: &'static str, description: impl Into<String>) -> Self {
        ProtocolFault::MalformedField {
            field,
            description: description.into(),
        }
    }

    pub(crate) fn unexpected_symbol(symbol: &[u8]) -> Self {
        ProtocolFault::UnexpectedSymbol {
            symbol: String::from_utf8_lossy(symbol).into_owned(),
        }
    }
}

/// Represents errors that can occur during rangefinder operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport failed.
    #[error(transparent)]
    Io(#[from] IoError),

    /// The reply violated the protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolFault),

    /// The sensor answered with an error status.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// A value handed to the codec or the command builder is out of range.
    #[error("invalid argument: {description}")]
    InvalidArgument { description: String },

    /// The reply was well formed but of another kind than the operation needs.
    #[error("unexpected reply: {description}")]
    UnexpectedReply { description: String },
}

impl Error {
    pub(crate) fn invalid_argument(description: impl Into<String>) -> Self {
        Error::InvalidArgument {
            description: description.into(),
        }
    }

    /// The status code the sensor reported, when the error carries one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Device(e) => Some(e.status),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.into())
    }
}

/// A specialized `Result` type for rangefinder operations.
pub type Result<T> = std::result::Result<T, Error>;
