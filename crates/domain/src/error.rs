use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by every printer-bridge operation.
///
/// Each variant maps onto a stable [`ErrorKind`] so callers on the far side of
/// the bridge can branch on a code instead of parsing messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrinterError {
    /// Missing or malformed request fields, detected before any I/O
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No active, verified connection
    #[error("Printer not connected")]
    NotConnected,

    /// Open/close/read/write failure, including post-connect verification
    #[error("Transport error: {0}")]
    Transport(String),

    /// Image data could not be turned into a bitmap
    #[error("Decode error: {0}")]
    Decode(String),

    /// Unrecognized or unavailable operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl PrinterError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::NotConnected => ErrorKind::NotConnected,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Unsupported(_) => ErrorKind::Unsupported,
        }
    }

    /// Human-readable reason without the kind prefix
    pub fn reason(&self) -> String {
        match self {
            Self::InvalidArgument(msg)
            | Self::Transport(msg)
            | Self::Decode(msg)
            | Self::Unsupported(msg) => msg.clone(),
            Self::NotConnected => "Printer not connected".to_string(),
        }
    }
}

impl From<std::io::Error> for PrinterError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Failure category reported alongside the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    #[serde(rename = "INVALID_ARGS")]
    InvalidArgument,
    #[serde(rename = "NOT_CONNECTED")]
    NotConnected,
    #[serde(rename = "TRANSPORT_ERROR")]
    Transport,
    #[serde(rename = "DECODE_ERROR")]
    Decode,
    #[serde(rename = "UNSUPPORTED")]
    Unsupported,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGS",
            Self::NotConnected => "NOT_CONNECTED",
            Self::Transport => "TRANSPORT_ERROR",
            Self::Decode => "DECODE_ERROR",
            Self::Unsupported => "UNSUPPORTED",
        }
    }
}

pub type Result<T> = std::result::Result<T, PrinterError>;
