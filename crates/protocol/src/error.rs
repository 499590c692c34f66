//! Error types for the protocol crate.

use thiserror::Error;

use crate::endpoint::EndpointError;

/// Protocol error type covering all possible failure modes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    // Line errors
    /// An inbound line exceeds the maximum allowed length.
    #[error("line too long: {size} bytes exceeds maximum of {max} bytes")]
    LineTooLong {
        /// Number of bytes read before giving up.
        size: usize,
        /// Maximum allowed line length.
        max: usize,
    },

    /// An outbound line contains a line terminator and would split on the wire.
    #[error("message contains a line break")]
    EmbeddedNewline,

    // Message validation errors
    /// The outbound message is empty after trimming whitespace.
    #[error("message cannot be empty")]
    EmptyMessage,

    // Connection errors
    /// Connection was closed or reset by the peer.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Operation timed out.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Any other I/O failure on the channel.
    #[error("I/O error: {0}")]
    Io(String),

    // Addressing errors
    /// Host or port could not be validated.
    #[error(transparent)]
    InvalidEndpoint(#[from] EndpointError),
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::TimedOut => ProtocolError::Timeout(err.to_string()),
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof => ProtocolError::ConnectionClosed(err.to_string()),
            _ => ProtocolError::Io(err.to_string()),
        }
    }
}

impl ProtocolError {
    /// Whether the error means the peer is gone rather than a local failure.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ProtocolError::ConnectionClosed(_))
    }
}
