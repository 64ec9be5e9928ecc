//! Error types for the streaming core

use thiserror::Error;

/// Coarse classification of a [`StreamError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Recording was requested while the channel is not connected
    ChannelUnavailable,
    /// The capture device refused access
    PermissionDenied,
    /// The capture device is missing or could not be opened
    DeviceUnavailable,
    /// A frame was sent while the channel is not connected
    NotConnected,
    /// An inbound frame could not be understood
    Protocol,
}

/// Main error type for the streaming core
#[derive(Error, Debug, Clone)]
pub enum StreamError {
    #[error("Channel unavailable: not connected to the server")]
    ChannelUnavailable,

    #[error("Capture permission denied: {0}")]
    PermissionDenied(String),

    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl StreamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StreamError::ChannelUnavailable => ErrorKind::ChannelUnavailable,
            StreamError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            StreamError::DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
            StreamError::NotConnected => ErrorKind::NotConnected,
            StreamError::Protocol(_) => ErrorKind::Protocol,
        }
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(e: serde_json::Error) -> Self {
        StreamError::Protocol(e.to_string())
    }
}

/// Result type alias for the streaming core
pub type Result<T> = std::result::Result<T, StreamError>;
