use std::fmt;

use thiserror::Error;

/// Why a remote transport stopped accepting calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed its output cleanly. Not an error.
    EndOfStream,
    /// Undecodable or out-of-sequence input.
    Malformed(String),
    /// Reading from or writing to the peer failed.
    Io(String),
    /// A call waited longer than the configured timeout.
    TimedOut { after_ms: u64 },
    /// Closed locally.
    Shutdown,
}

impl CloseReason {
    pub fn is_error(&self) -> bool {
        !matches!(self, CloseReason::EndOfStream | CloseReason::Shutdown)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::EndOfStream => write!(f, "end of stream"),
            CloseReason::Malformed(msg) => write!(f, "malformed message: {}", msg),
            CloseReason::Io(msg) => write!(f, "i/o error: {}", msg),
            CloseReason::TimedOut { after_ms } => write!(f, "no response after {}ms", after_ms),
            CloseReason::Shutdown => write!(f, "shut down"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BuildgenError {
    #[error("Transport closed: {0}")]
    TransportClosed(CloseReason),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Plugin {plugin} failed: {message}")]
    Plugin { plugin: String, message: String },

    #[error("Invalid label: {0}")]
    InvalidLabel(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, BuildgenError>;

impl From<std::io::Error> for BuildgenError {
    fn from(e: std::io::Error) -> Self {
        BuildgenError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for BuildgenError {
    fn from(e: serde_json::Error) -> Self {
        BuildgenError::MalformedMessage(e.to_string())
    }
}

impl From<anyhow::Error> for BuildgenError {
    fn from(e: anyhow::Error) -> Self {
        BuildgenError::Internal(e.to_string())
    }
}
