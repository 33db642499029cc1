//! Bolt protocol error types.

use std::io;
use thiserror::Error;

use super::packstream::PackStreamError;

/// Result type for Bolt operations.
pub type BoltResult<T> = Result<T, BoltError>;

/// Bolt protocol errors.
#[derive(Error, Debug)]
pub enum BoltError {
    /// Malformed PackStream bytes
    #[error("Format error: {0}")]
    Format(PackStreamError),

    /// A caller-supplied parameter violates a documented limit
    #[error("Validation error: {0}")]
    Validation(String),

    /// Version negotiation failed
    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Decoded data does not fit the requested Rust type
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// The peer sent a well-formed message that breaks the protocol
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// The server answered with FAILURE
    #[error("Server failure: {code} - {message}")]
    Failure {
        /// Neo4j status code
        code: String,
        /// Server message
        message: String,
    },

    /// Message too large
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Size reached so far
        size: usize,
        /// Configured limit
        max: usize,
    },

    /// Connection closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BoltError {
    /// Validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Protocol violation
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::ProtocolViolation(msg.into())
    }

    /// Mapping error
    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::Mapping(msg.into())
    }
}

impl From<PackStreamError> for BoltError {
    fn from(err: PackStreamError) -> Self {
        match err {
            PackStreamError::Mapping(msg) => BoltError::Mapping(msg),
            PackStreamError::ValueTooLarge(..) | PackStreamError::InvalidSignature(_) => {
                BoltError::Validation(err.to_string())
            }
            other => BoltError::Format(other),
        }
    }
}

/// Handshake-specific errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// The server replied with version 0
    #[error("Server rejected all proposed protocol versions")]
    Rejected,

    /// The server chose a version that was not proposed
    #[error("Server selected unsupported version: 0x{0:08X}")]
    UnsupportedVersion(u32),

    /// The proposal list is empty or too long
    #[error("Invalid version proposal: {0}")]
    InvalidProposal(String),

    /// Connection closed during handshake
    #[error("Connection closed during handshake")]
    ConnectionClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_error_display() {
        assert!(HandshakeError::Rejected.to_string().contains("rejected"));
        assert!(HandshakeError::UnsupportedVersion(7)
            .to_string()
            .contains("0x00000007"));
    }

    #[test]
    fn test_bolt_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let bolt_err: BoltError = io_err.into();
        assert!(matches!(bolt_err, BoltError::Io(_)));
    }

    #[test]
    fn test_bolt_error_from_handshake() {
        let bolt_err: BoltError = HandshakeError::Rejected.into();
        assert!(matches!(bolt_err, BoltError::Handshake(HandshakeError::Rejected)));
    }

    #[test]
    fn test_packstream_error_routing() {
        assert!(matches!(
            BoltError::from(PackStreamError::UnexpectedEof),
            BoltError::Format(PackStreamError::UnexpectedEof)
        ));
        assert!(matches!(
            BoltError::from(PackStreamError::InvalidSignature(0x80)),
            BoltError::Validation(_)
        ));
        assert!(matches!(
            BoltError::from(PackStreamError::Mapping("bad".into())),
            BoltError::Mapping(m) if m == "bad"
        ));
    }
}
