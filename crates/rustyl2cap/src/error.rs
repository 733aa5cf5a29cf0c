//! Error types for the rustyl2cap library
//!
//! This module defines the error type returned by every channel operation.

use std::io;
use thiserror::Error;

/// Errors that can occur when working with an L2CAP channel
#[derive(Error, Debug)]
pub enum L2capError {
    /// The caller passed an unusable argument; no kernel call was made.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A kernel call failed.
    #[error("{context}. [{}] {source}", .source.raw_os_error().unwrap_or(0))]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The peer hung up or the socket reported an error.
    #[error("Peer closed connection")]
    PeerClosed,

    /// The channel was closed locally while it was being used.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type for L2CAP operations
pub type L2capResult<T> = std::result::Result<T, L2capError>;

impl L2capError {
    /// Builds an I/O error from `errno` of the last failed libc call.
    pub(crate) fn last_os_error(context: impl Into<String>) -> Self {
        Self::io(context, io::Error::last_os_error())
    }

    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        L2capError::Io {
            context: context.into(),
            source,
        }
    }

    /// The operating system error code, if this error came from a kernel call.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            L2capError::Io { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }

    pub fn is_peer_closed(&self) -> bool {
        matches!(self, L2capError::PeerClosed)
    }

    pub fn is_locally_closed(&self) -> bool {
        matches!(self, L2capError::ConnectionClosed)
    }
}

impl From<L2capError> for io::Error {
    fn from(err: L2capError) -> Self {
        match err {
            L2capError::Io { source, .. } => source,
            L2capError::InvalidArgument(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            L2capError::PeerClosed => {
                io::Error::new(io::ErrorKind::ConnectionReset, "Peer closed connection")
            }
            L2capError::ConnectionClosed => {
                io::Error::new(io::ErrorKind::NotConnected, "Connection closed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display_carries_errno() {
        let err = L2capError::io("Failed to connect", io::Error::from_raw_os_error(libc::EHOSTDOWN));
        let text = err.to_string();

        assert!(text.starts_with(&format!("Failed to connect. [{}] ", libc::EHOSTDOWN)));
        assert_eq!(err.raw_os_error(), Some(libc::EHOSTDOWN));
    }

    #[test]
    fn test_closed_messages() {
        assert_eq!(L2capError::PeerClosed.to_string(), "Peer closed connection");
        assert_eq!(L2capError::ConnectionClosed.to_string(), "Connection closed");
        assert!(L2capError::PeerClosed.is_peer_closed());
        assert!(L2capError::ConnectionClosed.is_locally_closed());
        assert_eq!(L2capError::PeerClosed.raw_os_error(), None);
    }

    #[test]
    fn test_conversion_to_io_error() {
        let err: io::Error = L2capError::PeerClosed.into();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);

        let err: io::Error = L2capError::InvalidArgument("empty buffer".into()).into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
